/// Build-time metadata captured by the `built` crate.
pub mod built_info {
    use lazy_static::lazy_static;

    // The file has been placed there by the build script.
    include!(concat!(env!("OUT_DIR"), "/built.rs"));

    lazy_static! {
        /// The version string reported by the CLI: the package version, plus
        /// the short commit hash and a dirty marker when built from a git
        /// checkout.
        pub static ref VERSION: String = {
            let prefix = match GIT_COMMIT_HASH {
                Some(hash) if hash.len() >= 7 => format!("{}-{}", PKG_VERSION, &hash[0..7]),
                _ => PKG_VERSION.to_string(),
            };
            match GIT_DIRTY {
                Some(true) => format!("{prefix}-dirty"),
                _ => prefix,
            }
        };
    }
}
