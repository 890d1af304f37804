//! The merged runtime profile and the reapply algorithm that builds it.

use super::library::Library;
use super::patch::{JarMod, ProblemSeverity};
use super::stack::VersionPatchStack;
use crate::error::{Error, Result};
use std::collections::BTreeSet;

/// The effective runtime configuration derived from the ordered patch stack.
///
/// A profile is only ever produced by [`reapply`]; nothing outside the
/// `apply_*` setters mutates it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeProfile {
    /// Minecraft version id. Decides which client jar to use.
    pub minecraft_version: String,
    /// Release type, "release" or "snapshot".
    pub release_type: String,
    /// Assets id, "legacy" or a version id.
    pub assets: String,
    pub minecraft_arguments: String,
    /// Arguments as contributed by the minecraft-version patch alone,
    /// kept for inheritance and diff display.
    pub vanilla_minecraft_arguments: String,
    pub tweakers: Vec<String>,
    pub main_class: String,
    pub applet_class: String,
    pub libraries: Vec<Library>,
    /// Libraries contributed by non-customized patches alone.
    pub vanilla_libraries: Vec<Library>,
    /// Collected from all patches; patches can only add.
    pub traits: BTreeSet<String>,
    pub jar_mods: Vec<JarMod>,
}

impl RuntimeProfile {
    pub fn clear(&mut self) {
        *self = RuntimeProfile::default();
    }

    pub fn apply_minecraft_version(&mut self, id: &str) {
        self.minecraft_version = id.to_string();
    }

    pub fn apply_minecraft_version_type(&mut self, release_type: &str) {
        self.release_type = release_type.to_string();
    }

    pub fn apply_main_class(&mut self, main_class: &str) {
        self.main_class = main_class.to_string();
    }

    pub fn apply_applet_class(&mut self, applet_class: &str) {
        self.applet_class = applet_class.to_string();
    }

    /// Last writer wins; the vanilla copy is captured only from the
    /// designated minecraft-version patch.
    pub fn apply_minecraft_arguments(&mut self, arguments: &str, is_minecraft: bool) {
        self.minecraft_arguments = arguments.to_string();
        if is_minecraft {
            self.vanilla_minecraft_arguments = arguments.to_string();
        }
    }

    pub fn apply_minecraft_assets(&mut self, assets: &str) {
        self.assets = assets.to_string();
    }

    /// Union only; a later patch can never retract a trait.
    pub fn apply_traits(&mut self, traits: &[String]) {
        for t in traits {
            self.traits.insert(t.clone());
        }
    }

    /// Append in patch order; duplicates are allowed.
    pub fn apply_tweakers(&mut self, tweakers: &[String]) {
        self.tweakers.extend(tweakers.iter().cloned());
    }

    pub fn apply_jar_mods(&mut self, jar_mods: &[JarMod]) {
        self.jar_mods.extend(jar_mods.iter().cloned());
    }

    /// Append, except that a library with the same coordinate replaces the
    /// earlier entry in place. `vanilla` marks contributions from
    /// non-customized patches, which also feed the vanilla-only list.
    pub fn apply_library(&mut self, library: Library, vanilla: bool) {
        if vanilla {
            Self::upsert(&mut self.vanilla_libraries, library.clone());
        }
        Self::upsert(&mut self.libraries, library);
    }

    fn upsert(list: &mut Vec<Library>, library: Library) {
        match list.iter().position(|l| l.identity() == library.identity()) {
            Some(idx) => list[idx] = library,
            None => list.push(library),
        }
    }

    pub fn has_trait(&self, name: &str) -> bool {
        self.traits.contains(name)
    }

    /// Assets id with the historical default.
    pub fn assets_id(&self) -> &str {
        if self.assets.is_empty() {
            "legacy"
        } else {
            &self.assets
        }
    }

    /// Java libraries that belong on the classpath.
    pub fn active_normal_libs(&self) -> impl Iterator<Item = &Library> {
        self.libraries.iter().filter(|l| !l.natives)
    }

    /// Native libraries that must be available to the process.
    pub fn active_native_libs(&self) -> impl Iterator<Item = &Library> {
        self.libraries.iter().filter(|l| l.natives)
    }
}

/// Replay the ordered patch stack into a fresh profile.
///
/// Fails on the first structural problem: a patch that already carries an
/// error-severity problem, or a stack without a minecraft-version patch.
/// This is the variant for callers that must react to the failure; everyone
/// else goes through [`reapply_safe`].
pub fn reapply(stack: &VersionPatchStack) -> Result<RuntimeProfile> {
    reapply_inner(stack).map_err(|(_, e)| e)
}

/// Like [`reapply`], but converts failure into `None` plus a recorded
/// problem on the offending patch instead of propagating.
pub fn reapply_safe(stack: &mut VersionPatchStack) -> Option<RuntimeProfile> {
    match reapply_inner(stack) {
        Ok(profile) => Some(profile),
        Err((offender, error)) => {
            log::error!("failed to reapply patch stack: {}", error);
            let description = error.to_string();
            if let Some(patch) = stack.patch_mut(offender.unwrap_or(0)) {
                patch.add_problem(ProblemSeverity::Error, description);
            }
            None
        }
    }
}

fn reapply_inner(stack: &VersionPatchStack) -> Result<RuntimeProfile, (Option<usize>, Error)> {
    let mut profile = RuntimeProfile::default();
    for (index, patch) in stack.iter().enumerate() {
        if patch.has_failed() {
            return Err((
                Some(index),
                Error::structural(format!(
                    "patch '{}' has unresolved problems and cannot be applied",
                    patch.name()
                )),
            ));
        }
        patch.apply_to(&mut profile);
    }
    if profile.minecraft_version.is_empty() {
        return Err((
            None,
            Error::structural("the patch stack does not contain a minecraft version patch"),
        ));
    }
    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::profile::library::LibraryHint;
    use crate::game::profile::patch::{Patch, PatchDocument, PatchKind};

    fn minecraft_patch() -> Patch {
        Patch::from_document(PatchDocument {
            id: "net.minecraft".to_string(),
            version: Some("1.5.2".to_string()),
            order: Some(0),
            release_type: Some("release".to_string()),
            assets: Some("legacy".to_string()),
            main_class: Some("net.minecraft.client.Minecraft".to_string()),
            minecraft_arguments: Some("--username ${auth_player_name}".to_string()),
            traits: vec!["legacyFML".to_string()],
            libraries: vec![Library::new("L1")],
            ..Default::default()
        })
    }

    fn stack_with(patches: Vec<Patch>) -> VersionPatchStack {
        let mut stack = VersionPatchStack::new();
        for patch in patches {
            stack.append(patch).unwrap();
        }
        stack
    }

    #[test]
    fn reapply_is_deterministic() {
        let stack = stack_with(vec![minecraft_patch()]);
        let first = reapply(&stack).unwrap();
        let second = reapply(&stack).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn reapply_without_minecraft_patch_fails_structurally() {
        let stack = stack_with(vec![Patch::from_document(PatchDocument {
            id: "net.minecraftforge".to_string(),
            order: Some(1),
            libraries: vec![Library::new("forge:forge:7.8.1")],
            ..Default::default()
        })]);
        let err = reapply(&stack).unwrap_err();
        assert!(matches!(err, Error::Structural(_)));
    }

    #[test]
    fn later_patch_overrides_library_by_identity_exactly_once() {
        let mut local = Library::new("L1");
        local.hint = LibraryHint::Local;
        let custom = Patch::new(
            PatchKind::Custom,
            PatchDocument {
                id: "custom".to_string(),
                order: Some(1),
                libraries: vec![local],
                ..Default::default()
            },
        );
        let stack = stack_with(vec![minecraft_patch(), custom]);

        let profile = reapply(&stack).unwrap();
        let matching: Vec<_> = profile
            .libraries
            .iter()
            .filter(|l| l.name == "L1")
            .collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].hint, LibraryHint::Local);
        // vanilla list keeps the non-customized contribution
        assert_eq!(profile.vanilla_libraries.len(), 1);
        assert_eq!(profile.vanilla_libraries[0].hint, LibraryHint::Normal);
    }

    #[test]
    fn traits_accumulate_as_a_union() {
        let forge = Patch::from_document(PatchDocument {
            id: "net.minecraftforge".to_string(),
            order: Some(1),
            traits: vec!["legacyFML".to_string(), "texturepacks".to_string()],
            libraries: vec![Library::new("forge:forge:7.8.1")],
            ..Default::default()
        });
        let stack = stack_with(vec![minecraft_patch(), forge]);
        let profile = reapply(&stack).unwrap();
        assert!(profile.has_trait("legacyFML"));
        assert!(profile.has_trait("texturepacks"));
        assert_eq!(profile.traits.len(), 2);
    }

    #[test]
    fn vanilla_arguments_survive_later_overrides() {
        let tweak = Patch::from_document(PatchDocument {
            id: "org.tweaker".to_string(),
            order: Some(1),
            minecraft_arguments: Some("--username ${auth_player_name} --demo".to_string()),
            libraries: vec![Library::new("tweak:tweak:1")],
            ..Default::default()
        });
        let stack = stack_with(vec![minecraft_patch(), tweak]);
        let profile = reapply(&stack).unwrap();
        assert_eq!(
            profile.minecraft_arguments,
            "--username ${auth_player_name} --demo"
        );
        assert_eq!(
            profile.vanilla_minecraft_arguments,
            "--username ${auth_player_name}"
        );
    }

    #[test]
    fn tweakers_append_in_patch_order_with_duplicates() {
        let a = Patch::from_document(PatchDocument {
            id: "a".to_string(),
            order: Some(1),
            tweakers: vec!["cpw.mods.fml.common.launcher.FMLTweaker".to_string()],
            libraries: vec![Library::new("a:a:1")],
            ..Default::default()
        });
        let b = Patch::from_document(PatchDocument {
            id: "b".to_string(),
            order: Some(2),
            tweakers: vec![
                "cpw.mods.fml.common.launcher.FMLTweaker".to_string(),
                "org.spongepowered.asm.launch.MixinTweaker".to_string(),
            ],
            libraries: vec![Library::new("b:b:1")],
            ..Default::default()
        });
        let stack = stack_with(vec![minecraft_patch(), a, b]);
        let profile = reapply(&stack).unwrap();
        assert_eq!(profile.tweakers.len(), 3);
        assert_eq!(
            profile.tweakers[0],
            "cpw.mods.fml.common.launcher.FMLTweaker"
        );
    }

    #[test]
    fn reapply_safe_records_a_problem_instead_of_failing() {
        let mut stack = VersionPatchStack::new();
        stack
            .append(Patch::from_document(PatchDocument {
                id: "net.minecraftforge".to_string(),
                libraries: vec![Library::new("forge:forge:7.8.1")],
                ..Default::default()
            }))
            .unwrap();

        assert!(reapply_safe(&mut stack).is_none());
        let patch = stack.patch(0).unwrap();
        assert!(patch.has_failed());
        assert!(!patch.problems().is_empty());
    }
}
