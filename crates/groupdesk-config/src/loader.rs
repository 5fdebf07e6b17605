// SPDX-FileCopyrightText: 2026 Groupdesk Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment layering.
//!
//! Merge order, later wins: compiled defaults, `/etc/groupdesk/groupdesk.toml`,
//! `~/.config/groupdesk/groupdesk.toml`, `./groupdesk.toml`, `GROUPDESK_*` env.

#![allow(clippy::result_large_err)] // figment::Error is external

use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

use crate::model::GroupdeskConfig;

const FILE_NAME: &str = "groupdesk.toml";

/// Sections recognised in `GROUPDESK_<SECTION>_<KEY>` variables.
const SECTIONS: &[&str] = &["relay", "telegram", "intercom", "storage", "webhook"];

/// Candidate config files in merge order.
pub fn config_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc/groupdesk").join(FILE_NAME)];
    if let Some(dir) = dirs::config_dir() {
        paths.push(dir.join("groupdesk").join(FILE_NAME));
    }
    paths.push(PathBuf::from(FILE_NAME));
    paths
}

/// Builds the full layered figment without extracting it.
pub fn build_figment() -> Figment {
    config_paths()
        .into_iter()
        .fold(defaults(), |figment, path| figment.merge(Toml::file(path)))
        .merge(env_provider())
}

/// Loads from the XDG hierarchy with environment overrides.
pub fn load_config() -> Result<GroupdeskConfig, figment::Error> {
    build_figment().extract()
}

/// Loads one explicit file with environment overrides.
pub fn load_config_from_path(path: &Path) -> Result<GroupdeskConfig, figment::Error> {
    defaults()
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Loads from a TOML string only. No files, no environment.
pub fn load_config_from_str(toml_content: &str) -> Result<GroupdeskConfig, figment::Error> {
    defaults().merge(Toml::string(toml_content)).extract()
}

fn defaults() -> Figment {
    Figment::new().merge(Serialized::defaults(GroupdeskConfig::default()))
}

/// `GROUPDESK_INTERCOM_ACCESS_TOKEN` -> `intercom.access_token`.
///
/// Only the first underscore after a known section becomes a dot, since key
/// names themselves contain underscores.
fn env_provider() -> Env {
    Env::prefixed("GROUPDESK_").map(|key| {
        let key = key.as_str();
        SECTIONS
            .iter()
            .find_map(|section| {
                key.strip_prefix(section)
                    .and_then(|rest| rest.strip_prefix('_'))
                    .map(|rest| format!("{section}.{rest}"))
            })
            .unwrap_or_else(|| key.to_string())
            .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_vars_map_to_sections() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("GROUPDESK_INTERCOM_ACCESS_TOKEN", "tok");
            jail.set_env("GROUPDESK_RELAY_LOCK_TTL_SECS", "45");
            jail.set_env("GROUPDESK_WEBHOOK_PORT", "9000");

            let config: GroupdeskConfig = defaults().merge(env_provider()).extract()?;
            assert_eq!(config.intercom.access_token.as_deref(), Some("tok"));
            assert_eq!(config.relay.lock_ttl_secs, 45);
            assert_eq!(config.webhook.port, 9000);
            Ok(())
        });
    }

    #[test]
    fn local_file_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                FILE_NAME,
                r#"
[relay]
support_prefix = "[Help] "
"#,
            )?;
            let config = load_config()?;
            assert_eq!(config.relay.support_prefix, "[Help] ");
            assert_eq!(config.relay.max_delivery_attempts, 5);
            Ok(())
        });
    }
}
