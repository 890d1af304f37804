//! Static table of auxiliary libraries required by legacy FML/Forge
//! versions. These predate any download information in the version
//! documents, so the mapping is hardcoded per minecraft version.

use once_cell::sync::Lazy;
use std::collections::HashMap;

/// One legacy auxiliary library. `ours` selects our mirror over the
/// upstream base URL.
#[derive(Debug, Clone, Copy)]
pub struct LegacyLibrary {
    pub filename: &'static str,
    pub ours: bool,
}

const fn lib(filename: &'static str, ours: bool) -> LegacyLibrary {
    LegacyLibrary { filename, ours }
}

static LEGACY_LIBRARY_TABLE: Lazy<HashMap<&'static str, Vec<LegacyLibrary>>> = Lazy::new(|| {
    let fml_132 = vec![
        lib("argo-2.25.jar", false),
        lib("guava-12.0.1.jar", false),
        lib("asm-all-4.0.jar", false),
    ];
    let fml_14x = vec![
        lib("argo-2.25.jar", false),
        lib("guava-12.0.1.jar", false),
        lib("asm-all-4.0.jar", false),
        lib("bcprov-jdk15on-147.jar", false),
    ];
    let fml_15 = |deobf: &'static str| {
        vec![
            lib("argo-small-3.2.jar", false),
            lib("guava-14.0-rc3.jar", false),
            lib("asm-all-4.1.jar", false),
            lib("bcprov-jdk15on-148.jar", true),
            lib(deobf, true),
            lib("scala-library.jar", true),
        ]
    };

    let mut table = HashMap::new();
    table.insert("1.3.2", fml_132);
    for version in ["1.4", "1.4.1", "1.4.2", "1.4.3", "1.4.4", "1.4.5", "1.4.6", "1.4.7"] {
        table.insert(version, fml_14x.clone());
    }
    table.insert("1.5", fml_15("deobfuscation_data_1.5.zip"));
    table.insert("1.5.1", fml_15("deobfuscation_data_1.5.1.zip"));
    table.insert("1.5.2", fml_15("deobfuscation_data_1.5.2.zip"));
    table
});

/// Auxiliary libraries required for a minecraft version, empty for versions
/// that never needed them.
pub fn legacy_libraries_for(version: &str) -> &'static [LegacyLibrary] {
    LEGACY_LIBRARY_TABLE
        .get(version)
        .map(|libs| libs.as_slice())
        .unwrap_or(&[])
}
