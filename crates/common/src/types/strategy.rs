use serde::{Deserialize, Serialize};

/// A closed enum of known archival strategies. `name()` is the value sent
/// over the bus as the service name; `code()` is the small integer stored
/// in the `snapshot` table; `timeout_seconds()` comes from the tiered
/// timeout table, looked up by strategy rather than by ordinal range.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    Title,
    Favicon,
    Wget,
    Curl,
    Warc,
    Pdf,
    Screenshot,
    Dom,
    Singlefile,
    Readability,
    Mercury,
    Git,
    Ytdlp,
    ArchiveDotOrg,
}

/// Every known strategy, in code order. The webpage-job loop (C7) enumerates
/// this to create one pending snapshot per strategy.
pub const ALL_STRATEGIES: &[Strategy] = &[
    Strategy::Title,
    Strategy::Favicon,
    Strategy::Wget,
    Strategy::Curl,
    Strategy::Warc,
    Strategy::Pdf,
    Strategy::Screenshot,
    Strategy::Dom,
    Strategy::Singlefile,
    Strategy::Readability,
    Strategy::Mercury,
    Strategy::Git,
    Strategy::Ytdlp,
    Strategy::ArchiveDotOrg,
];

impl Strategy {
    /// The name sent over the bus as the service name and stored in the DB.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Title => "title",
            Self::Favicon => "favicon",
            Self::Wget => "wget",
            Self::Curl => "curl",
            Self::Warc => "warc",
            Self::Pdf => "pdf",
            Self::Screenshot => "screenshot",
            Self::Dom => "dom",
            Self::Singlefile => "singlefile",
            Self::Readability => "readability",
            Self::Mercury => "mercury",
            Self::Git => "git",
            Self::Ytdlp => "ytdlp",
            Self::ArchiveDotOrg => "archivedotorg",
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            Self::Title => 1,
            Self::Favicon => 2,
            Self::Wget => 3,
            Self::Curl => 4,
            Self::Warc => 5,
            Self::Pdf => 10,
            Self::Screenshot => 11,
            Self::Dom => 12,
            Self::Singlefile => 13,
            Self::Readability => 14,
            Self::Mercury => 15,
            Self::Git => 20,
            Self::Ytdlp => 21,
            Self::ArchiveDotOrg => 30,
        }
    }

    /// Tiered timeout table: informational/simple 90s, browser-mimicking 180s,
    /// git 180s, ytdlp 3600s, otherwise 60s.
    pub fn timeout_seconds(&self) -> u32 {
        match self {
            Self::Title | Self::Favicon | Self::Wget | Self::Curl | Self::Warc => 90,
            Self::Pdf | Self::Screenshot | Self::Dom | Self::Singlefile | Self::Readability
            | Self::Mercury => 180,
            Self::Git => 180,
            Self::Ytdlp => 3600,
            Self::ArchiveDotOrg => 60,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        ALL_STRATEGIES.iter().copied().find(|s| s.code() == code)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        ALL_STRATEGIES.iter().copied().find(|s| s.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_and_name_are_unique_across_all_strategies() {
        let mut codes: Vec<i32> = ALL_STRATEGIES.iter().map(Strategy::code).collect();
        codes.sort_unstable();
        let mut dedup = codes.clone();
        dedup.dedup();
        assert_eq!(codes, dedup);
    }

    #[test]
    fn timeout_tiers_match_the_spec_table() {
        assert_eq!(Strategy::Title.timeout_seconds(), 90);
        assert_eq!(Strategy::Curl.timeout_seconds(), 90);
        assert_eq!(Strategy::Pdf.timeout_seconds(), 180);
        assert_eq!(Strategy::Git.timeout_seconds(), 180);
        assert_eq!(Strategy::Ytdlp.timeout_seconds(), 3600);
        assert_eq!(Strategy::ArchiveDotOrg.timeout_seconds(), 60);
    }

    #[test]
    fn round_trips_through_code_and_name() {
        for s in ALL_STRATEGIES {
            assert_eq!(Strategy::from_code(s.code()), Some(*s));
            assert_eq!(Strategy::from_name(s.name()), Some(*s));
        }
    }
}
