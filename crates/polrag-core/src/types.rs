//! Domain types shared by the candidate source, the metadata store and the
//! retrieval orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

pub type ChunkId = String;
pub type Meta = HashMap<String, String>;

/// Output dimensionality of the embedding model. Checked once at startup.
pub const EMBEDDING_DIM: usize = 384;

macro_rules! closed_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $field:literal { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];
            pub const FIELD: &'static str = $field;

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            /// Strict parse of the canonical lower-case spelling.
            fn from_str(s: &str) -> Result<Self> {
                Self::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == s)
                    .ok_or_else(|| Error::InvalidFilterValue { field: $field, value: s.to_string() })
            }
        }
    };
}

closed_enum! {
    /// Publisher of the policy text.
    PolicySource, "policy_source" { Google => "google" }
}

closed_enum! {
    /// Geographic applicability of a chunk.
    Region, "region" { Global => "global", Us => "us", Eu => "eu", Uk => "uk" }
}

closed_enum! {
    /// Kind of ad content a chunk governs.
    ContentType, "content_type" {
        AdText => "ad_text",
        Image => "image",
        Video => "video",
        LandingPage => "landing_page",
        General => "general",
    }
}

/// Depth of a section in the policy hierarchy. `Minor` is a leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionLevel {
    Major,
    Minor,
}

impl SectionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionLevel::Major => "major",
            SectionLevel::Minor => "minor",
        }
    }

    pub fn is_leaf(&self) -> bool { matches!(self, SectionLevel::Minor) }

    /// Accepts the canonical names plus HTML heading tags written by ingestion.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "major" | "h1" | "h2" => Some(SectionLevel::Major),
            "minor" | "h3" | "h4" | "h5" | "h6" => Some(SectionLevel::Minor),
            _ => None,
        }
    }
}

impl fmt::Display for SectionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Authoritative chunk record held by the metadata store.
///
/// - `id`: globally unique, assigned once at chunk creation, equal to the key
///   of the chunk's vector in the candidate source
/// - `doc_id` + `chunk_index`: unique position of the chunk in its document
/// - `policy_section`/`policy_path`: leaf title and full hierarchical path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyChunk {
    pub id: ChunkId,
    pub doc_id: String,
    pub chunk_index: u32,
    pub chunk_text: String,
    pub policy_source: PolicySource,
    pub policy_section: String,
    pub policy_path: String,
    pub section_level: SectionLevel,
    pub region: Region,
    pub content_type: ContentType,
    pub doc_url: String,
    pub effective_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A raw match from the vector index. Lives only for one retrieval call.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: ChunkId,
    /// Smaller is more similar.
    pub distance: f32,
    pub metadata: Option<Meta>,
}

/// One ranked passage returned to the caller.
///
/// Order in the returned sequence is the ranking; `score` is the fused
/// relevance before any hierarchy boost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk_id: ChunkId,
    pub chunk_text: String,
    pub policy_section: String,
    pub policy_path: String,
    pub policy_section_level: SectionLevel,
    pub doc_id: String,
    pub doc_url: String,
    pub policy_source: PolicySource,
    pub region: Region,
    pub content_type: ContentType,
    pub score: f64,
}

impl RetrievalResult {
    pub fn from_chunk(chunk: &PolicyChunk, score: f64) -> Self {
        Self {
            chunk_id: chunk.id.clone(),
            chunk_text: chunk.chunk_text.clone(),
            policy_section: chunk.policy_section.clone(),
            policy_path: chunk.policy_path.clone(),
            policy_section_level: chunk.section_level,
            doc_id: chunk.doc_id.clone(),
            doc_url: chunk.doc_url.clone(),
            policy_source: chunk.policy_source,
            region: chunk.region,
            content_type: chunk.content_type,
            score,
        }
    }
}

/// Caller input as received at the boundary: filters are still raw strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalRequest {
    pub query: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub policy_source: Option<String>,
    #[serde(default = "default_prefer_specific")]
    pub prefer_specific: bool,
}

fn default_limit() -> i64 { 5 }
fn default_prefer_specific() -> bool { true }

impl RetrievalRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            limit: default_limit(),
            region: None,
            content_type: None,
            policy_source: None,
            prefer_specific: default_prefer_specific(),
        }
    }

    pub fn limit(mut self, limit: i64) -> Self { self.limit = limit; self }
    pub fn region(mut self, region: impl Into<String>) -> Self { self.region = Some(region.into()); self }
    pub fn content_type(mut self, content_type: impl Into<String>) -> Self { self.content_type = Some(content_type.into()); self }
    pub fn policy_source(mut self, source: impl Into<String>) -> Self { self.policy_source = Some(source.into()); self }
    pub fn prefer_specific(mut self, prefer: bool) -> Self { self.prefer_specific = prefer; self }
}
