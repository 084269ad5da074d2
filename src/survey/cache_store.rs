// Persistence of the geocoding cache and loading of the override file.

use survey_processing::geocode::{GeocodeCache, OverrideEntry, OverrideTable};

use crate::survey::*;

/// Loads the cache. A missing or unreadable cache file is not an error: the
/// run starts with an empty cache.
pub fn load_cache(path: &str) -> GeocodeCache {
    if !Path::new(path).exists() {
        info!("load_cache: no cache at {:?}, starting with an empty cache", path);
        return GeocodeCache::new();
    }
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!(
                "load_cache: error reading {:?}, starting with an empty cache: {}",
                path, e
            );
            return GeocodeCache::new();
        }
    };
    match serde_json::from_str::<GeocodeCache>(&contents) {
        Ok(cache) => {
            debug!("load_cache: {} entries from {:?}", cache.len(), path);
            cache
        }
        Err(e) => {
            warn!(
                "load_cache: error parsing {:?}, starting with an empty cache: {}",
                path, e
            );
            GeocodeCache::new()
        }
    }
}

pub fn save_cache(path: &str, cache: &GeocodeCache) -> BSurveyResult<()> {
    let pretty_js = serde_json::to_string_pretty(cache).context(SerializingJsonSnafu {})?;
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context(WritingJsonSnafu { path })?;
        }
    }
    fs::write(path, pretty_js).context(WritingJsonSnafu { path })?;
    debug!("save_cache: {} entries written to {:?}", cache.len(), path);
    Ok(())
}

/// Loads the override file: a list of `{"address": ..., "coordinates": [lat, lon]}`.
pub fn load_overrides(path: &str) -> BSurveyResult<OverrideTable> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let entries: Vec<OverrideEntry> =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path })?;
    let table = OverrideTable::from_entries(&entries).context(InvalidOverridesSnafu { path })?;
    info!("load_overrides: {} overrides from {:?}", table.len(), path);
    Ok(table)
}
