use std::env;

use mural_core::RemoteConfig;

use crate::cli::ConfigCommands;
use crate::config_profiles::{
    normalize_text_option, CliProfilesConfig, SUPABASE_ANON_KEY_ENV, SUPABASE_URL_ENV,
};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            supabase_url,
            supabase_anon_key,
            no_activate,
        } => {
            let mut config = CliProfilesConfig::load().map_err(CliError::Config)?;
            let profile_name = init_profile(
                &mut config,
                profile.as_deref().or(global_profile),
                supabase_url,
                supabase_anon_key,
                no_activate,
            )?;

            let path = config.save().map_err(CliError::Config)?;
            println!(
                "Profile '{}' initialized at {}",
                profile_name,
                path.display()
            );
            let remote_ready = config
                .profile(&profile_name)
                .is_some_and(|profile| profile.supabase_url().is_some());
            if remote_ready {
                println!("Profile '{profile_name}' will reconcile with Supabase.");
            } else {
                println!("Profile '{profile_name}' has no remote store; records stay local.");
            }
            Ok(())
        }
    }
}

/// Merge explicit values, environment variables and the existing profile,
/// in that order, and validate the result. Returns the profile name.
pub fn init_profile(
    config: &mut CliProfilesConfig,
    profile_name: Option<&str>,
    supabase_url: Option<String>,
    supabase_anon_key: Option<String>,
    no_activate: bool,
) -> Result<String, CliError> {
    let profile_name = config.resolve_profile_name(profile_name);
    let existing = config.profile(&profile_name).cloned().unwrap_or_default();

    let merged_url = normalize_text_option(supabase_url)
        .or_else(|| normalize_text_option(env::var(SUPABASE_URL_ENV).ok()))
        .or_else(|| existing.supabase_url());
    let merged_anon_key = normalize_text_option(supabase_anon_key)
        .or_else(|| normalize_text_option(env::var(SUPABASE_ANON_KEY_ENV).ok()))
        .or_else(|| existing.supabase_anon_key());

    let remote = RemoteConfig::resolve(merged_url, merged_anon_key)
        .map_err(|error| CliError::Config(error.to_string()))?;

    let profile = config.profile_mut_or_default(&profile_name);
    profile.supabase_url = remote.supabase_url;
    profile.supabase_anon_key = remote.supabase_anon_key;

    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }
    Ok(profile_name)
}
