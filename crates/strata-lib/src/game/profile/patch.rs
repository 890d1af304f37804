use super::library::Library;
use super::profile::RuntimeProfile;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A jar mod applied on top of the client jar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JarMod {
    pub name: String,
    /// Name to show the user when the mod cannot be resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub absolute_url: Option<String>,
}

impl JarMod {
    pub fn display_name(&self) -> &str {
        self.original_name.as_deref().unwrap_or(&self.name)
    }

    pub fn has_url(&self) -> bool {
        self.absolute_url.as_deref().is_some_and(|url| !url.is_empty())
    }
}

/// Reference to another required component, `uid` plus an optional version
/// constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    pub uid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// On-disk patch document. The same shape is used for version documents
/// served by the metadata service and for patches stored in an instance's
/// `patches/` directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PatchDocument {
    #[serde(alias = "uid")]
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub release_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<Reference>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applet_class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minecraft_arguments: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assets: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub traits: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tweakers: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub libraries: Vec<Library>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub jar_mods: Vec<JarMod>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ProblemSeverity {
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct PatchProblem {
    pub severity: ProblemSeverity,
    pub description: String,
}

/// Closed set of patch behaviors. The kind decides mutability and which
/// merge rules fire during reapply; there is no open-ended dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchKind {
    /// Installed from a version document of the metadata service.
    Version,
    /// Contributes libraries (loaders, tweakers and the like).
    Library,
    /// Contributes only jar mods.
    JarMod,
    /// User-owned editable copy created by customization.
    Custom,
}

/// One ordered unit of profile configuration.
#[derive(Debug, Clone)]
pub struct Patch {
    pub kind: PatchKind,
    pub doc: PatchDocument,
    pub order: i32,
    problems: Vec<PatchProblem>,
    /// The original patch this customization superseded, kept for revert.
    pub(super) base: Option<Box<Patch>>,
}

impl Patch {
    pub fn new(kind: PatchKind, doc: PatchDocument) -> Self {
        let order = doc.order.unwrap_or(0);
        Self {
            kind,
            doc,
            order,
            problems: Vec::new(),
            base: None,
        }
    }

    /// Classify a freshly parsed document into its patch kind.
    pub fn from_document(doc: PatchDocument) -> Self {
        let kind = if doc.id == "net.minecraft" || doc.id == "org.lwjgl" {
            PatchKind::Version
        } else if !doc.jar_mods.is_empty() && doc.libraries.is_empty() && doc.main_class.is_none()
        {
            PatchKind::JarMod
        } else {
            PatchKind::Library
        };
        Self::new(kind, doc)
    }

    pub fn id(&self) -> &str {
        &self.doc.id
    }

    pub fn name(&self) -> &str {
        self.doc.name.as_deref().unwrap_or(&self.doc.id)
    }

    pub fn version(&self) -> Option<&str> {
        self.doc.version.as_deref()
    }

    /// The one patch that decides the minecraft version itself.
    pub fn is_minecraft_version(&self) -> bool {
        self.kind == PatchKind::Version && self.doc.id == "net.minecraft"
    }

    pub fn is_moveable(&self) -> bool {
        self.kind != PatchKind::Version
    }

    pub fn is_customizable(&self) -> bool {
        matches!(self.kind, PatchKind::Version | PatchKind::Library)
    }

    pub fn is_custom(&self) -> bool {
        self.kind == PatchKind::Custom
    }

    pub fn is_revertible(&self) -> bool {
        self.is_custom() && self.base.is_some()
    }

    pub fn is_removable(&self) -> bool {
        self.kind != PatchKind::Version
    }

    pub fn is_editable(&self) -> bool {
        self.is_custom()
    }

    pub fn add_problem(&mut self, severity: ProblemSeverity, description: impl Into<String>) {
        self.problems.push(PatchProblem {
            severity,
            description: description.into(),
        });
    }

    pub fn problems(&self) -> &[PatchProblem] {
        &self.problems
    }

    pub fn clear_problems(&mut self) {
        self.problems.clear();
    }

    pub fn problem_severity(&self) -> Option<ProblemSeverity> {
        self.problems.iter().map(|p| p.severity).max()
    }

    pub fn has_failed(&self) -> bool {
        self.problem_severity() == Some(ProblemSeverity::Error)
    }

    /// Replay this patch's operations onto the profile. The merge rule for
    /// each field lives in the corresponding `apply_*` setter.
    pub fn apply_to(&self, profile: &mut RuntimeProfile) {
        let is_minecraft = self.is_minecraft_version();
        let vanilla = !self.is_custom();

        if is_minecraft {
            if let Some(version) = &self.doc.version {
                profile.apply_minecraft_version(version);
            }
        }
        if let Some(release_type) = &self.doc.release_type {
            profile.apply_minecraft_version_type(release_type);
        }
        if let Some(main_class) = &self.doc.main_class {
            profile.apply_main_class(main_class);
        }
        if let Some(applet_class) = &self.doc.applet_class {
            profile.apply_applet_class(applet_class);
        }
        if let Some(arguments) = &self.doc.minecraft_arguments {
            profile.apply_minecraft_arguments(arguments, is_minecraft);
        }
        if let Some(assets) = &self.doc.assets {
            profile.apply_minecraft_assets(assets);
        }
        profile.apply_traits(&self.doc.traits);
        profile.apply_tweakers(&self.doc.tweakers);
        profile.apply_jar_mods(&self.doc.jar_mods);
        for library in &self.doc.libraries {
            profile.apply_library(library.clone(), vanilla);
        }
    }
}
