//! Terrain stores: heightmap squares and per-plugin texture palettes.
//!
//! Both stores are read from background terrain-streaming threads once
//! loading ends, so neither may be mutated after `set_up`. They get away
//! without any locking because all reads go through `&self` and nothing
//! writes post-`set_up`; that "no writes after `set_up`" rule is a hard
//! invariant, not an optimization.

use tracing::debug;

use crate::codec::RecordReader;
use crate::error::{Result, StoreError};
use crate::records::{Land, LandTexture};
use crate::types::{GridPos, PluginIndex};

// ---------------------------------------------------------------------------
// LandStore
// ---------------------------------------------------------------------------

/// Heightmap records in a flat array, sorted by `(x, y)` at `set_up`.
///
/// Load-time deduplication is a linear scan; that cost is paid once at
/// startup, after which every lookup is a binary search.
#[derive(Debug, Clone, Default)]
pub struct LandStore {
    lands: Vec<Box<Land>>,
}

impl LandStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one land record. A record for an already-loaded coordinate
    /// replaces it: last plugin wins.
    ///
    /// # Errors
    /// Decode failures propagate unmodified.
    pub fn load(&mut self, reader: &mut dyn RecordReader) -> Result<()> {
        let land = Box::new(Land::load(reader)?);
        if let Some(slot) = self.lands.iter_mut().find(|l| l.grid == land.grid) {
            debug!(grid = %land.grid, "land square redefined by a later plugin");
            *slot = land;
        } else {
            self.lands.push(land);
        }
        Ok(())
    }

    /// Sort the array for binary-search lookup. Run once, after all
    /// plugins are loaded; lookups before this see an unsorted array and
    /// are not supported.
    pub fn set_up(&mut self) {
        self.lands.sort_by_key(|l| l.grid);
    }

    /// Look up the terrain square at `(x, y)`.
    ///
    /// Safe to call from multiple reader threads once `set_up` has run.
    #[must_use]
    pub fn search(&self, x: i32, y: i32) -> Option<&Land> {
        let key = GridPos::new(x, y);
        self.lands
            .binary_search_by_key(&key, |l| l.grid)
            .ok()
            .map(|i| &*self.lands[i])
    }

    /// Like [`LandStore::search`], but absence is an error.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if no square sits at `(x, y)`.
    pub fn find(&self, x: i32, y: i32) -> Result<&Land> {
        self.search(x, y)
            .ok_or_else(|| StoreError::not_found(GridPos::new(x, y)))
    }

    /// Number of loaded terrain squares.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lands.len()
    }

    /// True if no terrain has been loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lands.is_empty()
    }

    /// Iterate terrain squares; `(x, y)`-sorted after `set_up`.
    pub fn iter(&self) -> impl Iterator<Item = &Land> {
        self.lands.iter().map(|l| &**l)
    }
}

// ---------------------------------------------------------------------------
// LandTextureStore
// ---------------------------------------------------------------------------

/// Texture palette table indexed by plugin, then by the plugin's local
/// texture index.
///
/// Texture indexes are only meaningful relative to the plugin that wrote
/// them, hence the two-level shape. Slots inside a grown table that no
/// record filled stay undefined and report as absent.
#[derive(Debug, Clone)]
pub struct LandTextureStore {
    tables: Vec<Vec<Option<LandTexture>>>,
}

impl Default for LandTextureStore {
    fn default() -> Self {
        Self {
            // The base plugin's table always exists.
            tables: vec![Vec::new()],
        }
    }
}

impl LandTextureStore {
    /// Create a store with an empty base-plugin table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one texture entry into the table of the plugin the reader
    /// is positioned in, growing both table levels to fit.
    ///
    /// # Errors
    /// Decode failures propagate unmodified.
    pub fn load(&mut self, reader: &mut dyn RecordReader, id: &str) -> Result<()> {
        let plugin = reader.plugin_index();
        let texture = LandTexture::load(reader, id)?;

        if plugin >= self.tables.len() {
            self.tables.resize_with(plugin + 1, Vec::new);
        }
        let table = &mut self.tables[plugin];
        let slot = texture.index as usize;
        if slot >= table.len() {
            table.resize_with(slot + 1, || None);
        }
        table[slot] = Some(texture);
        Ok(())
    }

    /// Look up a texture by plugin and local index.
    ///
    /// Safe to call from multiple reader threads once loading has ended.
    #[must_use]
    pub fn search(&self, plugin: PluginIndex, index: u32) -> Option<&LandTexture> {
        self.tables
            .get(plugin)?
            .get(index as usize)?
            .as_ref()
    }

    /// Like [`LandTextureStore::search`], but absence is an error.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] for an unknown plugin or an unfilled slot.
    pub fn find(&self, plugin: PluginIndex, index: u32) -> Result<&LandTexture> {
        self.search(plugin, index)
            .ok_or_else(|| StoreError::not_found(format!("texture {index} in plugin {plugin}")))
    }

    /// Number of per-plugin tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// A store always has at least the base-plugin table.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Number of slots in one plugin's table, zero for unknown plugins.
    #[must_use]
    pub fn plugin_len(&self, plugin: PluginIndex) -> usize {
        self.tables.get(plugin).map_or(0, Vec::len)
    }

    /// Iterate the filled entries of one plugin's table.
    pub fn iter_plugin(&self, plugin: PluginIndex) -> impl Iterator<Item = &LandTexture> {
        self.tables
            .get(plugin)
            .into_iter()
            .flatten()
            .filter_map(Option::as_ref)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
