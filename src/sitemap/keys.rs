//! Sitemap kinds, their cache keys, and the public filenames that map onto them.

use std::fmt;

pub const ROOT_KEY: &str = "sitemap:root";
pub const PAGES_KEY: &str = "sitemap:pages";
pub const INFO_KEY: &str = "sitemaps:info";

/// Kinds large enough to be split into numbered chunks behind an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChunkedKind {
    Post,
    Job,
}

impl ChunkedKind {
    pub const ALL: [ChunkedKind; 2] = [ChunkedKind::Post, ChunkedKind::Job];

    /// Namespace segment used in keys and filenames.
    pub fn slug(self) -> &'static str {
        match self {
            Self::Post => "post",
            Self::Job => "job",
        }
    }

    /// `type` reported in the sitemap listing.
    pub fn info_type(self) -> &'static str {
        match self {
            Self::Post => "blog",
            Self::Job => "job",
        }
    }

    pub fn index_key(self) -> String {
        format!("sitemap:{}:index", self.slug())
    }

    pub fn chunk_key(self, n: u32) -> String {
        format!("sitemap:{}:chunk:{n}", self.slug())
    }

    /// Glob over this kind's chunk keys. Also matches the count key.
    pub fn chunk_pattern(self) -> String {
        format!("sitemap:{}:chunk:*", self.slug())
    }

    /// Chunk number of a key produced by [`Self::chunk_key`].
    pub fn chunk_number(self, key: &str) -> Option<u32> {
        let n = key
            .strip_prefix("sitemap:")?
            .strip_prefix(self.slug())?
            .strip_prefix(":chunk:")?;
        parse_chunk_number(n)
    }

    pub fn count_key(self) -> String {
        format!("sitemap:{}:chunk:count", self.slug())
    }

    pub fn index_file(self) -> String {
        format!("sitemap-{}.xml", self.slug())
    }

    pub fn chunk_file(self, n: u32) -> String {
        format!("sitemap-{}-{n}.xml", self.slug())
    }

    fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.slug() == slug)
    }
}

impl fmt::Display for ChunkedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// Job listing dimensions, each published as one single-document sitemap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobFacet {
    Category,
    Tag,
    EmploymentType,
    ExperienceLevel,
    EducationLevel,
}

impl JobFacet {
    pub const ALL: [JobFacet; 5] = [
        JobFacet::Category,
        JobFacet::Tag,
        JobFacet::EmploymentType,
        JobFacet::ExperienceLevel,
        JobFacet::EducationLevel,
    ];

    /// Segment used in keys, filenames, and public URLs.
    pub fn slug(self) -> &'static str {
        match self {
            Self::Category => "category",
            Self::Tag => "tag",
            Self::EmploymentType => "employment-type",
            Self::ExperienceLevel => "experience-level",
            Self::EducationLevel => "education-level",
        }
    }

    pub fn key(self) -> String {
        format!("sitemap:job:facet:{}", self.slug())
    }

    pub fn file(self) -> String {
        format!("sitemap-job-{}.xml", self.slug())
    }

    pub fn info_type(self) -> String {
        format!("job-{}", self.slug())
    }

    fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.slug() == slug)
    }
}

impl fmt::Display for JobFacet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

/// A requestable sitemap document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SitemapFile {
    Root,
    Pages,
    Index(ChunkedKind),
    Chunk(ChunkedKind, u32),
    Facet(JobFacet),
}

impl SitemapFile {
    /// Parse a filename from the versioned route (`sitemap-post-3.xml`).
    pub fn parse(filename: &str) -> Option<Self> {
        let stem = filename.strip_suffix(".xml")?;
        if stem == "sitemap" {
            return Some(Self::Root);
        }
        let rest = stem.strip_prefix("sitemap-")?;
        if rest == "pages" {
            return Some(Self::Pages);
        }
        if let Some(kind) = ChunkedKind::from_slug(rest) {
            return Some(Self::Index(kind));
        }
        if let Some(facet) = rest.strip_prefix("job-").and_then(JobFacet::from_slug) {
            return Some(Self::Facet(facet));
        }
        let (slug, n) = rest.rsplit_once('-')?;
        Some(Self::Chunk(ChunkedKind::from_slug(slug)?, parse_chunk_number(n)?))
    }

    /// Parse a filename from the unversioned route, which predates per-kind
    /// naming (`root.xml`, `pages.xml`, `blog.xml`, `blog-2.xml`).
    pub fn parse_legacy(filename: &str) -> Option<Self> {
        let stem = filename.strip_suffix(".xml")?;
        match stem {
            "root" | "sitemap" => Some(Self::Root),
            "pages" => Some(Self::Pages),
            "blog" => Some(Self::Index(ChunkedKind::Post)),
            _ => {
                let n = stem.strip_prefix("blog-")?;
                Some(Self::Chunk(ChunkedKind::Post, parse_chunk_number(n)?))
            }
        }
    }

    pub fn cache_key(self) -> String {
        match self {
            Self::Root => ROOT_KEY.to_owned(),
            Self::Pages => PAGES_KEY.to_owned(),
            Self::Index(kind) => kind.index_key(),
            Self::Chunk(kind, n) => kind.chunk_key(n),
            Self::Facet(facet) => facet.key(),
        }
    }

    /// Canonical filename under the versioned route.
    pub fn file_name(self) -> String {
        match self {
            Self::Root => "sitemap.xml".to_owned(),
            Self::Pages => "sitemap-pages.xml".to_owned(),
            Self::Index(kind) => kind.index_file(),
            Self::Chunk(kind, n) => kind.chunk_file(n),
            Self::Facet(facet) => facet.file(),
        }
    }
}

/// Chunk numbers start at 1 and must be written canonically (no sign, no leading zeros).
fn parse_chunk_number(s: &str) -> Option<u32> {
    if s.is_empty() || s.starts_with('0') || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
