//! Shared handler state.

use std::sync::Arc;

use chemlink_convert::{ConversionPipeline, ExtractService, RenderPipeline};
use chemlink_engines::{EmbeddedEngine, OpenBabel};
use chemlink_search::{SchedulerHandle, SearchService};

#[derive(Clone)]
pub struct AppState {
    pub conversion: ConversionPipeline,
    pub render: RenderPipeline,
    pub extract: ExtractService,
    pub search: SearchService,
    /// Running index scheduler; manual reindexes go through it when set.
    pub scheduler: Option<Arc<SchedulerHandle>>,
}

impl AppState {
    pub fn new(
        conversion: ConversionPipeline,
        render: RenderPipeline,
        extract: ExtractService,
        search: SearchService,
    ) -> Self {
        Self {
            conversion,
            render,
            extract,
            search,
            scheduler: None,
        }
    }

    /// Render and extract paths over both engines, sharing `conversion`.
    pub fn from_engines(
        conversion: ConversionPipeline,
        obabel: Arc<OpenBabel>,
        embedded: EmbeddedEngine,
        search: SearchService,
    ) -> Self {
        let render = RenderPipeline::standard(conversion.clone(), embedded.clone(), obabel);
        Self::new(conversion, render, ExtractService::new(embedded), search)
    }

    pub fn with_scheduler(mut self, scheduler: Arc<SchedulerHandle>) -> Self {
        self.scheduler = Some(scheduler);
        self
    }
}
