use anyhow::Result;
use shared::domain::Theme;

use crate::local_store::KeyValueStore;

pub const THEME_KEY: &str = "theme";

/// Missing or unrecognised values read as the light theme.
pub fn load_theme(store: &dyn KeyValueStore) -> Result<Theme> {
    Ok(store
        .get(THEME_KEY)?
        .as_deref()
        .and_then(Theme::parse)
        .unwrap_or_default())
}

pub fn toggle_theme(store: &dyn KeyValueStore) -> Result<Theme> {
    let next = load_theme(store)?.toggled();
    store.set(THEME_KEY, next.as_str())?;
    Ok(next)
}
