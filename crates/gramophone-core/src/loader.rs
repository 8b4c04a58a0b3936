//! Song loading on top of a media index and a blacklist.

use tracing::{debug, warn};

use crate::blacklist::BlacklistStore;
use crate::error::{IndexError, Result};
use crate::index::{MediaIndex, MediaQuery};
use crate::query::{SortOrder, build_filter, id_equals, title_contains};
use crate::song::Song;

/// Loads songs from a [`MediaIndex`], hiding anything under a blacklisted path.
///
/// If the index refuses access (missing storage permission, unmounted volume)
/// queries return no songs instead of failing.
#[derive(Debug)]
pub struct SongLoader<I, B> {
    index: I,
    blacklist: B,
    sort_order: SortOrder,
}

impl<I: MediaIndex, B: BlacklistStore> SongLoader<I, B> {
    /// Create a loader using the default sort order.
    pub fn new(index: I, blacklist: B) -> Self {
        Self {
            index,
            blacklist,
            sort_order: SortOrder::default(),
        }
    }

    /// Set the sort order used when callers don't pass one.
    #[must_use]
    pub const fn with_sort_order(mut self, sort_order: SortOrder) -> Self {
        self.sort_order = sort_order;
        self
    }

    /// Current default sort order.
    pub const fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    /// Change the default sort order.
    pub const fn set_sort_order(&mut self, sort_order: SortOrder) {
        self.sort_order = sort_order;
    }

    /// The underlying index.
    pub const fn index(&self) -> &I {
        &self.index
    }

    /// Every song not excluded by the blacklist.
    pub fn all_songs(&self) -> Result<Vec<Song>> {
        self.songs(None, None)
    }

    /// Songs whose title contains `query`.
    pub fn search(&self, query: &str) -> Result<Vec<Song>> {
        let (predicate, values) = title_contains(query);
        self.songs(Some(predicate.as_str()), Some(values.as_slice()))
    }

    /// The song with the given id, or [`Song::EMPTY`].
    pub fn song(&self, id: i64) -> Result<Song> {
        let (predicate, values) = id_equals(id);
        Ok(self
            .songs(Some(predicate.as_str()), Some(values.as_slice()))?
            .into_iter()
            .next()
            .unwrap_or(Song::EMPTY))
    }

    /// Songs matching an extra predicate, in the default sort order.
    pub fn songs(&self, predicate: Option<&str>, values: Option<&[String]>) -> Result<Vec<Song>> {
        self.songs_sorted(predicate, values, self.sort_order)
    }

    /// Songs matching an extra predicate, in the given order.
    pub fn songs_sorted(
        &self,
        predicate: Option<&str>,
        values: Option<&[String]>,
        sort_order: SortOrder,
    ) -> Result<Vec<Song>> {
        let blacklist = self.blacklist.paths();
        let filter = build_filter(predicate, values, &blacklist);
        debug!(
            "Querying songs: {} [{} blacklisted paths]",
            filter.expression,
            blacklist.len()
        );

        let rows = match self.index.query(&MediaQuery::songs(filter, sort_order)) {
            Ok(rows) => rows,
            Err(e) if e.is_access_denied() => {
                warn!("Media index not accessible, returning no songs: {}", e);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let songs = rows
            .iter()
            .map(Song::try_from)
            .collect::<std::result::Result<Vec<_>, IndexError>>()?;
        debug!("Loaded {} songs", songs.len());
        Ok(songs)
    }
}
