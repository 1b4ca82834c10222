use serde::{Deserialize, Serialize};

/// What kind of release a search is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchKind {
    Artist,
    Album,
    Track,
}

impl SearchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchKind::Artist => "artist",
            SearchKind::Album => "album",
            SearchKind::Track => "track",
        }
    }
}

/// Immutable input to query building.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchContext {
    pub artist: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub album: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    pub kind: SearchKind,
}

impl SearchContext {
    pub fn album(artist: impl Into<String>, album: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            album: Some(album.into()),
            title: None,
            year: None,
            kind: SearchKind::Album,
        }
    }

    pub fn track(artist: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            artist: artist.into(),
            album: None,
            title: Some(title.into()),
            year: None,
            kind: SearchKind::Track,
        }
    }

    pub fn with_year(mut self, year: u16) -> Self {
        self.year = Some(year);
        self
    }

    /// Human-readable label for logs ("Artist - Album").
    pub fn label(&self) -> String {
        match self.album.as_deref().or(self.title.as_deref()) {
            Some(name) => format!("{} - {}", self.artist, name),
            None => self.artist.clone(),
        }
    }
}

/// Query templates and exclusions.
///
/// Templates use `{artist}`, `{album}`, `{title}` and `{year}` placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryTemplates {
    #[serde(default = "default_artist_template")]
    pub artist: String,
    #[serde(default = "default_album_template")]
    pub album: String,
    #[serde(default = "default_track_template")]
    pub track: String,
    /// Alternative templates tried on later attempts, in order.
    #[serde(default)]
    pub fallbacks: Vec<String>,
    /// Terms appended as `-term` negative filters.
    #[serde(default)]
    pub exclude_terms: Vec<String>,
}

fn default_artist_template() -> String {
    "{artist}".to_string()
}

fn default_album_template() -> String {
    "{artist} {album}".to_string()
}

fn default_track_template() -> String {
    "{artist} {title}".to_string()
}

impl Default for QueryTemplates {
    fn default() -> Self {
        Self {
            artist: default_artist_template(),
            album: default_album_template(),
            track: default_track_template(),
            fallbacks: Vec::new(),
            exclude_terms: Vec::new(),
        }
    }
}

impl QueryTemplates {
    /// Template for the given kind of search.
    pub fn for_kind(&self, kind: SearchKind) -> &str {
        match kind {
            SearchKind::Artist => &self.artist,
            SearchKind::Album => &self.album,
            SearchKind::Track => &self.track,
        }
    }
}

/// Result of building queries for one context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuiltQuery {
    pub primary: String,
    pub fallbacks: Vec<String>,
}
