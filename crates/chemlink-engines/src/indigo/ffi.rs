//! Runtime-loaded bindings to the Indigo C API.
//!
//! Only the calls chemlink uses are resolved. Integer-returning calls report
//! failure as `-1`, pointer-returning calls as null; the message is then
//! available from `indigoGetLastError` on the same thread.

use std::ffi::OsStr;
use std::os::raw::{c_char, c_double, c_int};

use libloading::Library;

use chemlink_core::{Error, Result};

pub type Qword = u64;

type SessionAllocFn = unsafe extern "C" fn() -> Qword;
type SessionFn = unsafe extern "C" fn(Qword);
type LastErrorFn = unsafe extern "C" fn() -> *const c_char;
type HandleFn = unsafe extern "C" fn(c_int) -> c_int;
type HandleStrFn = unsafe extern "C" fn(c_int) -> *const c_char;
type HandleDoubleFn = unsafe extern "C" fn(c_int) -> c_double;
type LoadFn = unsafe extern "C" fn(*const c_char) -> c_int;
type CheckStructureFn = unsafe extern "C" fn(*const c_char, *const c_char) -> *const c_char;
type SetOptionFn = unsafe extern "C" fn(*const c_char, *const c_char) -> c_int;
type SetOptionBoolFn = unsafe extern "C" fn(*const c_char, c_int) -> c_int;
type SetOptionXyFn = unsafe extern "C" fn(*const c_char, c_int, c_int) -> c_int;
type WriteBufferFn = unsafe extern "C" fn() -> c_int;
type ToBufferFn = unsafe extern "C" fn(c_int, *mut *mut c_char, *mut c_int) -> c_int;
type RenderFn = unsafe extern "C" fn(c_int, c_int) -> c_int;
type ChargeFn = unsafe extern "C" fn(c_int, *mut c_int) -> c_int;

macro_rules! symbol {
    ($lib:expr, $name:literal) => {{
        // SAFETY: the declared type matches the Indigo C header for this symbol.
        let sym = unsafe { $lib.get(concat!($name, "\0").as_bytes()) }.map_err(|e| {
            Error::Config(format!("Indigo symbol {} not found: {}", $name, e))
        })?;
        *sym
    }};
}

/// Entry points of `libindigo`.
pub struct IndigoApi {
    pub alloc_session_id: SessionAllocFn,
    pub set_session_id: SessionFn,
    pub release_session_id: SessionFn,
    pub get_last_error: LastErrorFn,
    pub free: HandleFn,

    pub set_option: SetOptionFn,
    pub set_option_bool: SetOptionBoolFn,
    pub set_option_xy: SetOptionXyFn,

    pub load_molecule: LoadFn,
    pub load_reaction: LoadFn,
    pub load_query_molecule: LoadFn,
    pub load_query_reaction: LoadFn,
    pub check_structure: CheckStructureFn,

    pub smiles: HandleStrFn,
    pub canonical_smiles: HandleStrFn,
    pub molfile: HandleStrFn,
    pub cdxml: HandleStrFn,
    pub json: HandleStrFn,
    pub cdx_base64: HandleStrFn,

    pub layout: HandleFn,
    pub write_buffer: WriteBufferFn,
    pub to_buffer: ToBufferFn,
    pub to_string: HandleStrFn,

    pub count_atoms: HandleFn,
    pub count_bonds: HandleFn,
    pub most_abundant_mass: HandleDoubleFn,
    pub molecular_weight: HandleDoubleFn,
    pub gross_formula: HandleFn,
    pub name: HandleStrFn,
    pub iterate_atoms: HandleFn,
    /// Returns 1 and writes the charge, or 0 if the atom has none set.
    pub get_charge: ChargeFn,
    pub iterate_components: HandleFn,
    pub iterate_reactants: HandleFn,
    pub iterate_products: HandleFn,
    pub iterate_catalysts: HandleFn,
    pub next: HandleFn,

    // Function pointers above borrow from this library; it must outlive them.
    _lib: Library,
}

impl IndigoApi {
    pub fn load(path: &OsStr) -> Result<Self> {
        // SAFETY: loading runs the library's initializers; libindigo has no
        // initialization side effects beyond its own allocator setup.
        let lib = unsafe { Library::new(path) }.map_err(|e| {
            Error::Config(format!(
                "Failed to load Indigo library {}: {}",
                path.to_string_lossy(),
                e
            ))
        })?;

        Ok(Self {
            alloc_session_id: symbol!(lib, "indigoAllocSessionId"),
            set_session_id: symbol!(lib, "indigoSetSessionId"),
            release_session_id: symbol!(lib, "indigoReleaseSessionId"),
            get_last_error: symbol!(lib, "indigoGetLastError"),
            free: symbol!(lib, "indigoFree"),
            set_option: symbol!(lib, "indigoSetOption"),
            set_option_bool: symbol!(lib, "indigoSetOptionBool"),
            set_option_xy: symbol!(lib, "indigoSetOptionXY"),
            load_molecule: symbol!(lib, "indigoLoadMoleculeFromString"),
            load_reaction: symbol!(lib, "indigoLoadReactionFromString"),
            load_query_molecule: symbol!(lib, "indigoLoadQueryMoleculeFromString"),
            load_query_reaction: symbol!(lib, "indigoLoadQueryReactionFromString"),
            check_structure: symbol!(lib, "indigoCheckStructure"),
            smiles: symbol!(lib, "indigoSmiles"),
            canonical_smiles: symbol!(lib, "indigoCanonicalSmiles"),
            molfile: symbol!(lib, "indigoMolfile"),
            cdxml: symbol!(lib, "indigoCdxml"),
            json: symbol!(lib, "indigoJson"),
            cdx_base64: symbol!(lib, "indigoCdxBase64"),
            layout: symbol!(lib, "indigoLayout"),
            write_buffer: symbol!(lib, "indigoWriteBuffer"),
            to_buffer: symbol!(lib, "indigoToBuffer"),
            to_string: symbol!(lib, "indigoToString"),
            count_atoms: symbol!(lib, "indigoCountAtoms"),
            count_bonds: symbol!(lib, "indigoCountBonds"),
            most_abundant_mass: symbol!(lib, "indigoMostAbundantMass"),
            molecular_weight: symbol!(lib, "indigoMolecularWeight"),
            gross_formula: symbol!(lib, "indigoGrossFormula"),
            name: symbol!(lib, "indigoName"),
            iterate_atoms: symbol!(lib, "indigoIterateAtoms"),
            get_charge: symbol!(lib, "indigoGetCharge"),
            iterate_components: symbol!(lib, "indigoIterateComponents"),
            iterate_reactants: symbol!(lib, "indigoIterateReactants"),
            iterate_products: symbol!(lib, "indigoIterateProducts"),
            iterate_catalysts: symbol!(lib, "indigoIterateCatalysts"),
            next: symbol!(lib, "indigoNext"),
            _lib: lib,
        })
    }
}

/// Entry points of `libindigo-renderer`.
pub struct RendererApi {
    /// Absent in renderer builds that predate per-session initialization.
    pub init: Option<SessionFn>,
    pub dispose: Option<SessionFn>,
    pub render: RenderFn,
    _lib: Library,
}

impl RendererApi {
    pub fn load(path: &OsStr) -> Result<Self> {
        // SAFETY: see `IndigoApi::load`.
        let lib = unsafe { Library::new(path) }.map_err(|e| {
            Error::Config(format!(
                "Failed to load Indigo renderer {}: {}",
                path.to_string_lossy(),
                e
            ))
        })?;

        // SAFETY: optional symbols share the declared session signature.
        let init = unsafe { lib.get::<SessionFn>(b"indigoRendererInit\0") }
            .ok()
            .map(|sym| *sym);
        let dispose = unsafe { lib.get::<SessionFn>(b"indigoRendererDispose\0") }
            .ok()
            .map(|sym| *sym);

        Ok(Self {
            init,
            dispose,
            render: symbol!(lib, "indigoRender"),
            _lib: lib,
        })
    }
}
