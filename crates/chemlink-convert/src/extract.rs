//! Structure property extraction.

use tracing::info;

use chemlink_core::{
    input_preview, ComponentProperties, Error, ExtractionResult, MoleculeInfo, Result,
};
use chemlink_engines::EmbeddedEngine;

/// Reports per-component properties through the embedded toolkit.
#[derive(Clone)]
pub struct ExtractService {
    engine: EmbeddedEngine,
}

impl ExtractService {
    pub fn new(engine: EmbeddedEngine) -> Self {
        Self { engine }
    }

    /// Properties the toolkit cannot compute are reported as zero or empty.
    pub async fn extract(&self, input: &str) -> Result<ExtractionResult> {
        if input.trim().is_empty() {
            return Err(Error::InvalidInput("input must not be empty".to_string()));
        }

        let report = self.engine.describe(input).await?;
        info!(
            subsystem = "convert",
            component = "extract",
            op = "extract",
            kind = report.kind.as_str(),
            result_count = report.components.len(),
            input = %input_preview(input),
            "Extracted structure properties"
        );

        Ok(ExtractionResult {
            molecule_info: report.components.into_iter().map(molecule_info).collect(),
            formula: report.formula.unwrap_or_default(),
            is_reaction: report.kind.is_reaction(),
        })
    }
}

fn molecule_info(component: ComponentProperties) -> MoleculeInfo {
    MoleculeInfo {
        atom_count: component.atom_count.unwrap_or(0),
        bond_count: component.bond_count.unwrap_or(0),
        formal_charge: component.formal_charge.unwrap_or(0),
        exact_mass: component.most_abundant_mass.unwrap_or(0.0),
        mass: component.molecular_weight.unwrap_or(0.0),
        formula: component.formula.unwrap_or_default(),
        name: component.name.unwrap_or_default(),
        role: component.role,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chemlink_core::{
        ImageFormat, ImageSize, MoleculeRole, StructureHandle, StructureKind, StructureToolkit,
        ToolkitSession,
    };

    /// Loads everything as the configured kind and reports fixed components.
    struct Fixture {
        kind: StructureKind,
        components: Vec<ComponentProperties>,
    }

    impl StructureToolkit for Fixture {
        fn name(&self) -> &'static str {
            "fixture"
        }

        fn open_session(&self) -> Result<Box<dyn ToolkitSession + '_>> {
            Ok(Box::new(FixtureSession(self)))
        }
    }

    struct FixtureSession<'a>(&'a Fixture);

    impl ToolkitSession for FixtureSession<'_> {
        fn check_structure(&self, _input: &str) -> Result<String> {
            Ok(String::new())
        }

        fn load(&self, input: &str, kind: StructureKind) -> Result<StructureHandle> {
            if input == "garbage" || kind != self.0.kind {
                return Err(Error::Toolkit("cannot load".to_string()));
            }
            Ok(StructureHandle(7))
        }

        fn to_format(&self, _h: StructureHandle, _format: &str) -> Result<Option<String>> {
            Ok(None)
        }

        fn render(&self, _h: StructureHandle, _f: ImageFormat, _s: ImageSize) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }

        fn canonicalize(&self, _h: StructureHandle) -> Result<String> {
            Ok(String::new())
        }

        fn components(&self, _h: StructureHandle) -> Result<Vec<ComponentProperties>> {
            Ok(self.0.components.clone())
        }

        fn formula(&self, _h: StructureHandle) -> Result<String> {
            Err(Error::Toolkit("no gross formula for this object".to_string()))
        }
    }

    fn service(kind: StructureKind, components: Vec<ComponentProperties>) -> ExtractService {
        ExtractService::new(EmbeddedEngine::new(Arc::new(Fixture { kind, components })))
    }

    #[tokio::test]
    async fn test_extract_molecule() {
        let service = service(
            StructureKind::Molecule,
            vec![ComponentProperties {
                atom_count: Some(3),
                bond_count: Some(2),
                formal_charge: Some(0),
                formula: Some("C3 H8".to_string()),
                most_abundant_mass: Some(44.0626),
                molecular_weight: Some(44.097),
                name: Some("propane".to_string()),
                role: MoleculeRole::Molecule,
            }],
        );
        let result = service.extract("CCC").await.unwrap();
        assert!(!result.is_reaction);
        assert_eq!(result.molecule_info.len(), 1);
        let info = &result.molecule_info[0];
        assert_eq!(info.atom_count, 3);
        assert_eq!(info.bond_count, 2);
        assert!((info.exact_mass - 44.0626).abs() < 1e-9);
        assert!((info.mass - 44.097).abs() < 1e-9);
        assert_eq!(info.name, "propane");
        // formula unavailable for the whole structure
        assert_eq!(result.formula, "");
    }

    #[tokio::test]
    async fn test_extract_reaction_roles() {
        let service = service(
            StructureKind::Reaction,
            vec![
                ComponentProperties {
                    atom_count: Some(2),
                    formal_charge: Some(-1),
                    role: MoleculeRole::Reactant,
                    ..Default::default()
                },
                ComponentProperties {
                    atom_count: Some(2),
                    role: MoleculeRole::Product,
                    ..Default::default()
                },
            ],
        );
        let result = service.extract("CC>>CC").await.unwrap();
        assert!(result.is_reaction);
        assert_eq!(result.with_role(MoleculeRole::Reactant)[0].formal_charge, -1);
        assert_eq!(result.with_role(MoleculeRole::Product).len(), 1);
        assert!(result.with_role(MoleculeRole::Molecule).is_empty());
    }

    #[tokio::test]
    async fn test_missing_properties_default_to_zero() {
        let service = service(StructureKind::Molecule, vec![ComponentProperties::default()]);
        let result = service.extract("[*]").await.unwrap();
        let info = &result.molecule_info[0];
        assert_eq!(info.atom_count, 0);
        assert_eq!(info.formal_charge, 0);
        assert_eq!(info.exact_mass, 0.0);
        assert_eq!(info.mass, 0.0);
        assert_eq!(info.formula, "");
        assert_eq!(info.name, "");
    }

    #[tokio::test]
    async fn test_unparseable_is_invalid_structure() {
        let service = service(StructureKind::Molecule, Vec::new());
        let err = service.extract("garbage").await.unwrap_err();
        assert!(matches!(err, Error::InvalidStructure(_)));
    }

    #[tokio::test]
    async fn test_empty_input_is_invalid_input() {
        let service = service(StructureKind::Molecule, Vec::new());
        let err = service.extract(" ").await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
