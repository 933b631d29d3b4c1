//! Indigo, the embedded structure toolkit.
//!
//! The shared libraries are opened once per process. Every
//! [`ToolkitSession`] allocates its own Indigo session id so concurrent
//! requests never share loaded objects or option state.

mod ffi;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::{CStr, CString, OsString};
use std::os::raw::{c_char, c_int};
use std::sync::Arc;

use tracing::{debug, info};

use chemlink_core::defaults::RENDER_MARGIN_PX;
use chemlink_core::{
    ComponentProperties, Error, ImageFormat, ImageSize, MoleculeRole, Result, StructureHandle,
    StructureKind, StructureToolkit, ToolkitSession,
};

use ffi::{IndigoApi, Qword, RendererApi};

/// The Indigo library pair, loaded at runtime.
pub struct IndigoToolkit {
    api: Arc<IndigoApi>,
    renderer: Option<Arc<RendererApi>>,
}

impl IndigoToolkit {
    /// Open `libindigo` and, if given, `libindigo-renderer`.
    pub fn load(library: impl Into<OsString>, renderer: Option<OsString>) -> Result<Self> {
        let library = library.into();
        let api = IndigoApi::load(&library)?;
        let renderer = match renderer {
            Some(path) => Some(Arc::new(RendererApi::load(&path)?)),
            None => None,
        };
        info!(
            subsystem = "engine",
            component = "indigo",
            library = %library.to_string_lossy(),
            renderer = renderer.is_some(),
            "Indigo toolkit loaded"
        );
        Ok(Self {
            api: Arc::new(api),
            renderer,
        })
    }

    /// Paths from `INDIGO_LIBRARY_PATH` and `INDIGO_RENDERER_LIBRARY_PATH`,
    /// defaulting to the platform library names resolved by the loader.
    pub fn from_env() -> Result<Self> {
        let library = std::env::var_os("INDIGO_LIBRARY_PATH")
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| libloading::library_filename("indigo"));
        let renderer = std::env::var_os("INDIGO_RENDERER_LIBRARY_PATH")
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| libloading::library_filename("indigo-renderer"));
        Self::load(library, Some(renderer))
    }
}

impl StructureToolkit for IndigoToolkit {
    fn name(&self) -> &'static str {
        "indigo"
    }

    fn open_session(&self) -> Result<Box<dyn ToolkitSession + '_>> {
        Ok(Box::new(IndigoSession::open(
            &self.api,
            self.renderer.as_deref(),
        )?))
    }
}

struct IndigoSession<'a> {
    api: &'a IndigoApi,
    renderer: Option<&'a RendererApi>,
    id: Qword,
    renderer_ready: Cell<bool>,
    kinds: RefCell<HashMap<c_int, StructureKind>>,
}

impl<'a> IndigoSession<'a> {
    fn open(api: &'a IndigoApi, renderer: Option<&'a RendererApi>) -> Result<Self> {
        // SAFETY: session calls take no pointers.
        let id = unsafe { (api.alloc_session_id)() };
        let session = Self {
            api,
            renderer,
            id,
            renderer_ready: Cell::new(false),
            kinds: RefCell::new(HashMap::new()),
        };
        session.set_option_bool("ignore-stereochemistry-errors", true)?;
        Ok(session)
    }

    /// Indigo keeps the current session per thread.
    fn activate(&self) {
        // SAFETY: `self.id` was allocated by this library and not yet released.
        unsafe { (self.api.set_session_id)(self.id) }
    }

    fn last_error(&self) -> String {
        // SAFETY: returns a pointer to a library-owned, NUL-terminated buffer.
        let ptr = unsafe { (self.api.get_last_error)() };
        if ptr.is_null() {
            return "unknown Indigo error".to_string();
        }
        unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
    }

    fn check(&self, ret: c_int) -> Result<c_int> {
        if ret < 0 {
            Err(Error::Toolkit(self.last_error()))
        } else {
            Ok(ret)
        }
    }

    fn string(&self, ptr: *const c_char) -> Result<String> {
        if ptr.is_null() {
            return Err(Error::Toolkit(self.last_error()));
        }
        // SAFETY: non-null results are NUL-terminated and valid until the
        // next call on this session; the bytes are copied out immediately.
        Ok(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
    }

    fn set_option(&self, name: &str, value: &str) -> Result<()> {
        let name = c_string(name)?;
        let value = c_string(value)?;
        self.activate();
        // SAFETY: both pointers are valid for the duration of the call.
        self.check(unsafe { (self.api.set_option)(name.as_ptr(), value.as_ptr()) })?;
        Ok(())
    }

    fn set_option_bool(&self, name: &str, value: bool) -> Result<()> {
        let name = c_string(name)?;
        self.activate();
        // SAFETY: `name` is valid for the duration of the call.
        self.check(unsafe { (self.api.set_option_bool)(name.as_ptr(), value as c_int) })?;
        Ok(())
    }

    fn set_option_xy(&self, name: &str, x: i32, y: i32) -> Result<()> {
        let name = c_string(name)?;
        self.activate();
        // SAFETY: `name` is valid for the duration of the call.
        self.check(unsafe { (self.api.set_option_xy)(name.as_ptr(), x, y) })?;
        Ok(())
    }

    fn handle_string(&self, f: unsafe extern "C" fn(c_int) -> *const c_char, handle: c_int)
        -> Result<String> {
        self.activate();
        // SAFETY: `handle` belongs to this session.
        let ptr = unsafe { f(handle) };
        self.string(ptr)
    }

    fn free(&self, handle: c_int) {
        self.activate();
        // SAFETY: freeing an object of this session; failures are irrelevant here.
        unsafe { (self.api.free)(handle) };
    }

    fn ensure_renderer(&self) -> Result<&'a RendererApi> {
        let renderer = self.renderer.ok_or_else(|| {
            Error::Toolkit("Indigo renderer library is not loaded".to_string())
        })?;
        if !self.renderer_ready.get() {
            if let Some(init) = renderer.init {
                self.activate();
                // SAFETY: initializes renderer state for this session id.
                unsafe { init(self.id) };
            }
            self.renderer_ready.set(true);
        }
        Ok(renderer)
    }

    fn properties(&self, item: c_int, role: MoleculeRole) -> ComponentProperties {
        self.activate();
        // SAFETY: `item` is a live object of this session for all calls below.
        let atoms = unsafe { (self.api.count_atoms)(item) };
        let bonds = unsafe { (self.api.count_bonds)(item) };
        let mass = unsafe { (self.api.most_abundant_mass)(item) };
        let weight = unsafe { (self.api.molecular_weight)(item) };
        let formula = match unsafe { (self.api.gross_formula)(item) } {
            h if h > 0 => {
                let text = self.handle_string(self.api.to_string, h).ok();
                self.free(h);
                text
            }
            _ => None,
        };
        let name = self.handle_string(self.api.name, item).ok();
        ComponentProperties {
            atom_count: u32::try_from(atoms).ok(),
            bond_count: u32::try_from(bonds).ok(),
            formal_charge: self.formal_charge(item).ok(),
            formula: formula.map(|f| f.trim().to_string()).filter(|f| !f.is_empty()),
            most_abundant_mass: (mass >= 0.0).then_some(mass),
            molecular_weight: (weight >= 0.0).then_some(weight),
            name: name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
            role,
        }
    }

    /// Sum of the charges set on the atoms of `item`.
    fn formal_charge(&self, item: c_int) -> Result<i32> {
        self.activate();
        // SAFETY: `item` is a live object of this session.
        let iter = self.check(unsafe { (self.api.iterate_atoms)(item) })?;
        let mut total = 0;
        loop {
            self.activate();
            // SAFETY: `iter` is a live iterator of this session.
            let atom = match self.check(unsafe { (self.api.next)(iter) }) {
                Ok(0) => break,
                Ok(atom) => atom,
                Err(e) => {
                    self.free(iter);
                    return Err(e);
                }
            };
            let mut charge: c_int = 0;
            // SAFETY: `atom` is live and `charge` outlives the call.
            let set = unsafe { (self.api.get_charge)(atom, &mut charge) };
            self.free(atom);
            if set == 1 {
                total += charge;
            }
        }
        self.free(iter);
        Ok(total)
    }

    fn collect(
        &self,
        iterate: unsafe extern "C" fn(c_int) -> c_int,
        handle: c_int,
        role: MoleculeRole,
        out: &mut Vec<ComponentProperties>,
    ) -> Result<()> {
        self.activate();
        // SAFETY: `handle` is a live object of this session.
        let iter = self.check(unsafe { iterate(handle) })?;
        loop {
            self.activate();
            // SAFETY: `iter` is a live iterator of this session.
            let item = self.check(unsafe { (self.api.next)(iter) })?;
            if item == 0 {
                break;
            }
            out.push(self.properties(item, role));
            self.free(item);
        }
        self.free(iter);
        Ok(())
    }

    fn kind_of(&self, handle: StructureHandle) -> StructureKind {
        self.kinds
            .borrow()
            .get(&handle.0)
            .copied()
            .unwrap_or(StructureKind::Molecule)
    }
}

impl Drop for IndigoSession<'_> {
    fn drop(&mut self) {
        if self.renderer_ready.get() {
            if let Some(dispose) = self.renderer.and_then(|r| r.dispose) {
                // SAFETY: disposing renderer state created for this session.
                unsafe { dispose(self.id) };
            }
        }
        // SAFETY: releases every object owned by this session.
        unsafe { (self.api.release_session_id)(self.id) };
    }
}

impl ToolkitSession for IndigoSession<'_> {
    fn check_structure(&self, input: &str) -> Result<String> {
        let structure = c_string(input)?;
        let props = c_string("")?;
        self.activate();
        // SAFETY: both pointers are valid for the duration of the call.
        let ptr = unsafe { (self.api.check_structure)(structure.as_ptr(), props.as_ptr()) };
        self.string(ptr)
    }

    fn load(&self, input: &str, kind: StructureKind) -> Result<StructureHandle> {
        let text = c_string(input)?;
        let loader = match kind {
            StructureKind::Molecule => self.api.load_molecule,
            StructureKind::Reaction => self.api.load_reaction,
            StructureKind::QueryMolecule => self.api.load_query_molecule,
            StructureKind::QueryReaction => self.api.load_query_reaction,
        };
        self.activate();
        // SAFETY: `text` is valid for the duration of the call.
        let handle = self.check(unsafe { loader(text.as_ptr()) })?;
        self.kinds.borrow_mut().insert(handle, kind);
        Ok(StructureHandle(handle))
    }

    fn to_format(&self, handle: StructureHandle, format: &str) -> Result<Option<String>> {
        let writer = match format.trim().to_lowercase().as_str() {
            "cdx" => self.api.cdx_base64,
            "cdxml" => self.api.cdxml,
            "smiles" | "smi" => self.api.smiles,
            "ket" => self.api.json,
            "mol" => self.api.molfile,
            other => {
                debug!(component = "indigo", format = other, "No Indigo writer for format");
                return Ok(None);
            }
        };
        let text = self.handle_string(writer, handle.0)?;
        Ok(Some(text).filter(|t| !t.is_empty()))
    }

    fn render(&self, handle: StructureHandle, format: ImageFormat, size: ImageSize)
        -> Result<Vec<u8>> {
        let renderer = self.ensure_renderer()?;
        let width = i32::try_from(size.width)
            .map_err(|_| Error::InvalidInput(format!("width {} too large", size.width)))?;
        let height = i32::try_from(size.height)
            .map_err(|_| Error::InvalidInput(format!("height {} too large", size.height)))?;

        self.set_option("render-output-format", format.render_format().extension())?;
        self.set_option_xy("render-margins", RENDER_MARGIN_PX, RENDER_MARGIN_PX)?;
        self.set_option_xy("render-image-size", width, height)?;

        self.activate();
        // SAFETY: `handle` is a live object of this session.
        self.check(unsafe { (self.api.layout)(handle.0) })?;
        // SAFETY: allocates a buffer object in this session.
        let buffer = self.check(unsafe { (self.api.write_buffer)() })?;

        let result = (|| -> Result<Vec<u8>> {
            self.activate();
            // SAFETY: `handle` and `buffer` are live objects of this session.
            self.check(unsafe { (renderer.render)(handle.0, buffer) })?;
            let mut data: *mut c_char = std::ptr::null_mut();
            let mut len: c_int = 0;
            // SAFETY: out-pointers are valid; `data` stays owned by `buffer`.
            self.check(unsafe { (self.api.to_buffer)(buffer, &mut data, &mut len) })?;
            let len = usize::try_from(len).unwrap_or(0);
            if data.is_null() || len == 0 {
                return Ok(Vec::new());
            }
            // SAFETY: Indigo guarantees `len` readable bytes at `data`.
            Ok(unsafe { std::slice::from_raw_parts(data as *const u8, len) }.to_vec())
        })();
        self.free(buffer);
        result
    }

    fn canonicalize(&self, handle: StructureHandle) -> Result<String> {
        self.handle_string(self.api.canonical_smiles, handle.0)
    }

    fn components(&self, handle: StructureHandle) -> Result<Vec<ComponentProperties>> {
        let mut out = Vec::new();
        if self.kind_of(handle).is_reaction() {
            self.collect(self.api.iterate_reactants, handle.0, MoleculeRole::Reactant, &mut out)?;
            self.collect(self.api.iterate_products, handle.0, MoleculeRole::Product, &mut out)?;
            self.collect(self.api.iterate_catalysts, handle.0, MoleculeRole::Agent, &mut out)?;
        } else {
            self.collect(
                self.api.iterate_components,
                handle.0,
                MoleculeRole::Molecule,
                &mut out,
            )?;
        }
        Ok(out)
    }

    fn formula(&self, handle: StructureHandle) -> Result<String> {
        self.activate();
        // SAFETY: `handle` is a live object of this session.
        let formula = self.check(unsafe { (self.api.gross_formula)(handle.0) })?;
        let text = self.handle_string(self.api.to_string, formula);
        self.free(formula);
        text.map(|t| t.trim().to_string())
    }
}

fn c_string(value: &str) -> Result<CString> {
    CString::new(value)
        .map_err(|_| Error::Toolkit("Structure text contains a NUL byte".to_string()))
}
