//! Request, record and result types shared by every chemlink crate.

use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::defaults::{IMAGE_SIZE_PX, INPUT_PREVIEW_CHARS};
use crate::{Error, Result};

/// Shorten caller input for error messages and logs.
///
/// Inputs longer than [`INPUT_PREVIEW_CHARS`] are cut and suffixed with
/// `...` so the preview itself never exceeds that length.
pub fn input_preview(input: &str) -> String {
    if input.chars().count() <= INPUT_PREVIEW_CHARS {
        return input.to_string();
    }
    let kept: String = input.chars().take(INPUT_PREVIEW_CHARS - 3).collect();
    format!("{}...", kept)
}

/// Treat an explicit JSON `null` the same as a missing string field.
fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Treat an explicit JSON `null` as the field's default.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accept image dimensions as either JSON strings or numbers.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Dimension {
        Text(String),
        Number(u64),
    }

    Ok(match Option::<Dimension>::deserialize(deserializer)? {
        Some(Dimension::Text(text)) => Some(text),
        Some(Dimension::Number(n)) => Some(n.to_string()),
        None => None,
    })
}

// =============================================================================
// CONVERSION
// =============================================================================

/// A request to convert a structure from one notation to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionRequest {
    pub input: String,
    /// Empty means "unknown, let the toolkit sniff it".
    #[serde(default, deserialize_with = "null_as_empty")]
    pub input_format: String,
    pub output_format: String,
}

impl ConversionRequest {
    /// Request with an unknown input format.
    pub fn new(input: impl Into<String>, output_format: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            input_format: String::new(),
            output_format: output_format.into(),
        }
    }

    /// Request with an explicit input format.
    pub fn with_input_format(
        input: impl Into<String>,
        input_format: impl Into<String>,
        output_format: impl Into<String>,
    ) -> Self {
        Self {
            input: input.into(),
            input_format: input_format.into(),
            output_format: output_format.into(),
        }
    }

    pub fn has_input_format(&self) -> bool {
        !self.input_format.trim().is_empty()
    }

    pub fn preview(&self) -> String {
        input_preview(&self.input)
    }
}

// =============================================================================
// IMAGES
// =============================================================================

/// A request to render a structure as an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageRequest {
    pub input: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub input_format: String,
    pub output_format: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub width: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub height: Option<String>,
}

impl ImageRequest {
    pub fn new(
        input: impl Into<String>,
        input_format: impl Into<String>,
        output_format: impl Into<String>,
    ) -> Self {
        Self {
            input: input.into(),
            input_format: input_format.into(),
            output_format: output_format.into(),
            width: None,
            height: None,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width.to_string());
        self.height = Some(height.to_string());
        self
    }
}

/// Image kinds a caller may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
    Svg,
}

impl ImageFormat {
    /// Parse a caller-supplied format name (case-insensitive).
    pub fn parse(format: &str) -> Result<Self> {
        match format.trim().to_lowercase().as_str() {
            "png" => Ok(ImageFormat::Png),
            "jpg" | "jpeg" => Ok(ImageFormat::Jpeg),
            "svg" => Ok(ImageFormat::Svg),
            "" => Err(Error::UnsupportedImageFormat(
                "Output format is empty".to_string(),
            )),
            other => Err(Error::UnsupportedImageFormat(other.to_string())),
        }
    }

    /// Format the render chain produces for this request. The engines have
    /// no JPEG writer, so JPEG is rendered as PNG and re-encoded.
    pub fn render_format(self) -> Self {
        match self {
            ImageFormat::Jpeg => ImageFormat::Png,
            other => other,
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Svg => "svg",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Svg => "image/svg+xml",
        }
    }
}

/// Output image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ImageSize {
    fn default() -> Self {
        Self {
            width: IMAGE_SIZE_PX,
            height: IMAGE_SIZE_PX,
        }
    }
}

impl ImageSize {
    /// Resolve the optional request dimensions.
    ///
    /// Both absent (or blank) gives the default square; both must otherwise
    /// be supplied together as positive integers.
    pub fn from_request(width: Option<&str>, height: Option<&str>) -> Result<Self> {
        let width = width.map(str::trim).filter(|w| !w.is_empty());
        let height = height.map(str::trim).filter(|h| !h.is_empty());
        match (width, height) {
            (None, None) => Ok(Self::default()),
            (Some(w), Some(h)) => Ok(Self {
                width: parse_dimension("width", w)?,
                height: parse_dimension("height", h)?,
            }),
            _ => Err(Error::InvalidInput(
                "width and height must be supplied together".to_string(),
            )),
        }
    }
}

fn parse_dimension(name: &str, value: &str) -> Result<u32> {
    match value.parse::<u32>() {
        Ok(px) if px > 0 => Ok(px),
        _ => Err(Error::InvalidInput(format!(
            "{} must be a positive integer, got '{}'",
            name, value
        ))),
    }
}

/// What a single render strategy is asked to produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub input: String,
    pub input_format: String,
    /// Always PNG or SVG; JPEG is post-processed by the pipeline.
    pub format: ImageFormat,
    pub size: ImageSize,
}

// =============================================================================
// SEARCH
// =============================================================================

/// How a search term is matched against stored structures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SearchType {
    /// Canonically identical structures only.
    Exact,
    /// Stored structures containing the query as a connected subgraph.
    #[default]
    Substructure,
}

/// A structure saved for later search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub chemical: String,
    pub chemical_id: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub chemical_format: String,
}

impl SaveRequest {
    pub fn new(chemical: impl Into<String>, chemical_id: impl Into<String>) -> Self {
        Self {
            chemical: chemical.into(),
            chemical_id: chemical_id.into(),
            chemical_format: String::new(),
        }
    }
}

/// A search over saved structures.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    #[serde(rename = "chemicalSearchTerm", alias = "term", default)]
    pub term: Option<String>,
    #[serde(
        rename = "searchTermFormat",
        alias = "termFormat",
        default,
        deserialize_with = "null_as_empty"
    )]
    pub term_format: String,
    #[serde(rename = "searchType", default, deserialize_with = "null_as_default")]
    pub search_type: SearchType,
}

impl SearchQuery {
    pub fn new(term: impl Into<String>, search_type: SearchType) -> Self {
        Self {
            term: Some(term.into()),
            term_format: String::new(),
            search_type,
        }
    }

    /// The term, unless it is missing or blank.
    pub fn effective_term(&self) -> Option<&str> {
        self.term.as_deref().filter(|t| !t.trim().is_empty())
    }
}

/// A canonicalized structure stored in a chemical index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChemicalRecord {
    pub canonical_form: String,
    pub external_id: String,
}

impl ChemicalRecord {
    pub fn new(canonical_form: impl Into<String>, external_id: impl Into<String>) -> Self {
        Self {
            canonical_form: canonical_form.into(),
            external_id: external_id.into(),
        }
    }
}

/// Logical partitions of a tiered chemical index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexTier {
    /// Append-only log of every record ever saved.
    Master,
    /// Records saved since the last successful reindex.
    Delta,
    /// Accelerated index rebuilt from `Master` on each reindex.
    Fast,
}

impl IndexTier {
    pub fn as_str(self) -> &'static str {
        match self {
            IndexTier::Master => "master",
            IndexTier::Delta => "delta",
            IndexTier::Fast => "fast",
        }
    }
}

// =============================================================================
// STRUCTURES & EXTRACTION
// =============================================================================

/// How the embedded toolkit was asked to interpret a structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StructureKind {
    Molecule,
    Reaction,
    QueryMolecule,
    QueryReaction,
}

impl StructureKind {
    pub fn is_reaction(self) -> bool {
        matches!(self, StructureKind::Reaction | StructureKind::QueryReaction)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            StructureKind::Molecule => "molecule",
            StructureKind::Reaction => "reaction",
            StructureKind::QueryMolecule => "query_molecule",
            StructureKind::QueryReaction => "query_reaction",
        }
    }
}

/// Properties the embedded toolkit reports for one connected component.
///
/// `None` means the toolkit could not compute that property.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComponentProperties {
    pub atom_count: Option<u32>,
    pub bond_count: Option<u32>,
    /// Sum of atom charges.
    pub formal_charge: Option<i32>,
    pub formula: Option<String>,
    pub most_abundant_mass: Option<f64>,
    pub molecular_weight: Option<f64>,
    pub name: Option<String>,
    /// Position in a reaction, `Molecule` outside reactions.
    pub role: MoleculeRole,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MoleculeRole {
    #[default]
    Molecule,
    Reactant,
    Product,
    Agent,
}

/// Descriptive properties of one molecule.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoleculeInfo {
    pub atom_count: u32,
    pub bond_count: u32,
    pub formal_charge: i32,
    /// Most abundant isotope mass.
    pub exact_mass: f64,
    /// Average molecular weight.
    pub mass: f64,
    pub formula: String,
    pub name: String,
    pub role: MoleculeRole,
}

/// Request body for property extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    pub input: String,
}

/// Properties extracted from a structure.
///
/// Serializes with `reactants`, `products`, `molecules` and `agents` views
/// of `molecule_info` alongside the stored fields.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionResult {
    pub molecule_info: Vec<MoleculeInfo>,
    pub formula: String,
    pub is_reaction: bool,
}

impl ExtractionResult {
    pub fn with_role(&self, role: MoleculeRole) -> Vec<&MoleculeInfo> {
        self.molecule_info
            .iter()
            .filter(|m| m.role == role)
            .collect()
    }
}

impl Serialize for ExtractionResult {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut out = serializer.serialize_struct("ExtractionResult", 7)?;
        out.serialize_field("moleculeInfo", &self.molecule_info)?;
        out.serialize_field("formula", &self.formula)?;
        out.serialize_field("isReaction", &self.is_reaction)?;
        out.serialize_field("reactants", &self.with_role(MoleculeRole::Reactant))?;
        out.serialize_field("products", &self.with_role(MoleculeRole::Product))?;
        out.serialize_field("molecules", &self.with_role(MoleculeRole::Molecule))?;
        out.serialize_field("agents", &self.with_role(MoleculeRole::Agent))?;
        out.end()
    }
}
