//! Structured view of the SAM header text.
//!
//! Each line is `@` + a two-letter type code followed by tab-separated
//! `TAG:VALUE` fields:
//!
//! ```text
//! @HD	VN:1.6	SO:coordinate
//! @SQ	SN:chr1	LN:248956422
//! @RG	ID:grp1	SM:sample
//! @PG	ID:bwa	PN:bwa	VN:0.7.17
//! @CO	free text
//! ```
//!
//! `@HD` is a singleton; every other type is repeatable and kept in file
//! order. Repeatable types are additionally grouped by identifier (`SN` for
//! `@SQ`, `ID` otherwise) with the identifier removed from the grouped entry.

use log::{debug, warn};
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Singleton header type.
pub const SINGLETON_TYPE: &str = "HD";

/// Comment header type.
pub const COMMENT_TYPE: &str = "CO";

/// Ordered `TAG -> VALUE` fields of one header line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderEntry {
    fields: Vec<(String, String)>,
}

impl HeaderEntry {
    /// Value of `tag`, if present.
    pub fn get(&self, tag: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(t, _)| t == tag)
            .map(|(_, v)| v.as_str())
    }

    /// Set `tag`, replacing an existing value in place.
    pub fn insert(&mut self, tag: impl Into<String>, value: impl Into<String>) {
        let tag = tag.into();
        let value = value.into();
        match self.fields.iter_mut().find(|(t, _)| *t == tag) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((tag, value)),
        }
    }

    /// Remove `tag`, returning its value.
    pub fn remove(&mut self, tag: &str) -> Option<String> {
        let idx = self.fields.iter().position(|(t, _)| t == tag)?;
        Some(self.fields.remove(idx).1)
    }

    /// Fields in line order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(t, v)| (t.as_str(), v.as_str()))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// No fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Entries of one repeatable type keyed by identifier, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderGroup {
    entries: Vec<(String, HeaderEntry)>,
}

impl HeaderGroup {
    /// Entry for `id`, without its identifier field.
    pub fn get(&self, id: &str) -> Option<&HeaderEntry> {
        self.entries.iter().find(|(k, _)| k == id).map(|(_, e)| e)
    }

    /// Identifiers in file order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// `(id, entry)` pairs in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderEntry)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), e))
    }

    /// Number of keyed entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// No keyed entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Best-effort guess at which `@PG` entry produced the alignments.
///
/// This is a heuristic over program names; it is never authoritative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgramGuess {
    /// Exactly one plausible mapper
    Mapper(String),
    /// Several plausible candidates, in file order
    Ambiguous(Vec<String>),
    /// No `@PG` entries with an `ID`
    Unknown,
}

/// Parsed SAM header text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SamHeader {
    singleton: Option<HeaderEntry>,
    entries: HashMap<String, Vec<HeaderEntry>>,
    groups: HashMap<String, HeaderGroup>,
    comments: Vec<String>,
}

fn identifier_tag(record_type: &str) -> &'static str {
    if record_type == "SQ" {
        "SN"
    } else {
        "ID"
    }
}

fn parse_fields(record_type: &str, rest: &str, line_no: usize) -> HeaderEntry {
    let mut entry = HeaderEntry::default();
    for field in rest.split('\t').filter(|f| !f.is_empty()) {
        match field.split_once(':') {
            Some((tag, value)) if tag.len() == 2 => entry.insert(tag, value),
            _ => warn!(
                "Skipping malformed @{} field {:?} on header line {}",
                record_type, field, line_no
            ),
        }
    }
    entry
}

impl SamHeader {
    /// Parse header text.
    ///
    /// Parsing stops at the first line that does not begin with `@`.
    ///
    /// # Example
    ///
    /// ```
    /// use alnstream::io::bam::SamHeader;
    ///
    /// let header = SamHeader::parse("@HD\tVN:1.6\n@SQ\tSN:chr1\tLN:1000\n");
    /// assert_eq!(header.singleton_tag("HD", "VN"), Some("1.6"));
    /// assert_eq!(header.group("SQ").unwrap().get("chr1").unwrap().get("LN"), Some("1000"));
    /// ```
    pub fn parse(text: &str) -> Self {
        let mut header = SamHeader::default();

        for (idx, line) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = line.strip_suffix('\r').unwrap_or(line);
            if line.is_empty() {
                continue;
            }
            let Some(body) = line.strip_prefix('@') else {
                debug!("Header text ends at line {}", line_no);
                break;
            };

            let (record_type, rest) = body.split_once('\t').unwrap_or((body, ""));
            if record_type.len() != 2 {
                warn!("Skipping header line {} with type {:?}", line_no, record_type);
                continue;
            }

            if record_type == COMMENT_TYPE {
                header.comments.push(rest.to_owned());
                continue;
            }

            let entry = parse_fields(record_type, rest, line_no);
            if record_type == SINGLETON_TYPE {
                match header.singleton.as_mut() {
                    Some(existing) => {
                        warn!("Repeated @HD line {}; later values win", line_no);
                        for (tag, value) in entry.iter() {
                            existing.insert(tag, value);
                        }
                    }
                    None => header.singleton = Some(entry),
                }
            } else {
                header
                    .entries
                    .entry(record_type.to_owned())
                    .or_default()
                    .push(entry);
            }
        }

        header.build_groups();
        header
    }

    fn build_groups(&mut self) {
        for (record_type, entries) in &self.entries {
            let id_tag = identifier_tag(record_type);
            let mut group = HeaderGroup::default();
            for entry in entries {
                let mut keyed = entry.clone();
                let Some(id) = keyed.remove(id_tag) else {
                    debug!("@{} entry without {} left out of group", record_type, id_tag);
                    continue;
                };
                match group.entries.iter_mut().find(|(k, _)| *k == id) {
                    Some(slot) => {
                        warn!("Duplicate @{} {}:{}; later entry wins", record_type, id_tag, id);
                        slot.1 = keyed;
                    }
                    None => group.entries.push((id, keyed)),
                }
            }
            self.groups.insert(record_type.clone(), group);
        }
    }

    /// The `@HD` entry, if any.
    pub fn singleton(&self) -> Option<&HeaderEntry> {
        self.singleton.as_ref()
    }

    /// Value of `tag` on the singleton line of `record_type`.
    ///
    /// Only `HD` is a singleton type; any other type yields `None`.
    pub fn singleton_tag(&self, record_type: &str, tag: &str) -> Option<&str> {
        if record_type != SINGLETON_TYPE {
            return None;
        }
        self.singleton.as_ref()?.get(tag)
    }

    /// All entries of a repeatable type in file order, identifiers included.
    pub fn entries(&self, record_type: &str) -> &[HeaderEntry] {
        self.entries
            .get(record_type)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Entries of `record_type` keyed by identifier.
    pub fn group(&self, record_type: &str) -> Option<&HeaderGroup> {
        self.groups.get(record_type)
    }

    /// `@CO` lines in file order.
    pub fn comments(&self) -> &[String] {
        &self.comments
    }

    /// Guess the program that produced the alignments from `@PG` entries.
    ///
    /// Entries whose `ID` or `PN` names a known read mapper win. Failing that,
    /// entries that are not known post-processing tools are considered. More
    /// than one candidate is reported as [`ProgramGuess::Ambiguous`].
    pub fn mapping_program(&self) -> ProgramGuess {
        let programs: Vec<(&str, Option<&str>)> = self
            .entries("PG")
            .iter()
            .filter_map(|e| e.get("ID").map(|id| (id, e.get("PN"))))
            .collect();
        if programs.is_empty() {
            return ProgramGuess::Unknown;
        }

        let matches = |re: &Regex, (id, name): &(&str, Option<&str>)| {
            re.is_match(id) || name.is_some_and(|n| re.is_match(n))
        };

        let mappers: Vec<&str> = programs
            .iter()
            .filter(|p| matches(mapper_pattern(), p))
            .map(|(id, _)| *id)
            .collect();
        if !mappers.is_empty() {
            return pick(mappers);
        }

        let others: Vec<&str> = programs
            .iter()
            .filter(|p| !matches(post_processing_pattern(), p))
            .map(|(id, _)| *id)
            .collect();
        if !others.is_empty() {
            return pick(others);
        }

        ProgramGuess::Ambiguous(programs.iter().map(|(id, _)| id.to_string()).collect())
    }
}

fn pick(candidates: Vec<&str>) -> ProgramGuess {
    match candidates.as_slice() {
        [only] => ProgramGuess::Mapper(only.to_string()),
        _ => ProgramGuess::Ambiguous(candidates.into_iter().map(str::to_owned).collect()),
    }
}

fn mapper_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)^(bwa|bowtie2?|minimap2?|star|hisat2?|novoalign|tmap|ssaha2?|maq|mosaik|gsnap|gmap|subread|subjunc|blasr|ngmlr|last|smalt|soap2?)([^a-z0-9]|$)",
        )
        .expect("mapper pattern is valid")
    })
}

fn post_processing_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)^(samtools|picard|gatk|sambamba|biobambam|bamutil|bedtools|markduplicates|fgbio|umi[-_]?tools)",
        )
        .expect("post-processing pattern is valid")
    })
}
