//! Navigation-mesh store, dual-keyed by interior name or exterior grid.
//!
//! The record itself does not say which kind of cell it belongs to, so
//! classification cross-references the cell store: a cell name that
//! resolves to a known interior cell implies an interior pathgrid. This
//! is a heuristic with a known failure mode: a region sharing its name
//! with an interior cell misclassifies that region's pathgrids. The file
//! format offers nothing better, so the ambiguity is kept and logged
//! rather than papered over.

use std::collections::BTreeMap;
use tracing::warn;

use crate::cell_store::CellStore;
use crate::codec::RecordReader;
use crate::error::{Result, StoreError};
use crate::records::{Cell, Pathgrid};
use crate::types::GridPos;

/// Pathgrid table split by cell kind, upsert-on-duplicate.
#[derive(Debug, Clone, Default)]
pub struct PathgridStore {
    interiors: BTreeMap<String, Pathgrid>,
    exteriors: BTreeMap<GridPos, Pathgrid>,
}

impl PathgridStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one pathgrid and file it under its cell's identity,
    /// classifying interior against exterior via the cell store.
    ///
    /// # Errors
    /// Decode failures propagate unmodified.
    pub fn load(&mut self, reader: &mut dyn RecordReader, cells: &CellStore) -> Result<()> {
        let pathgrid = Pathgrid::load(reader)?;

        let interior = cells.search_interior(&pathgrid.cell).is_some();
        if interior && pathgrid.grid != GridPos::new(0, 0) {
            // An interior match carrying a nonzero grid key smells like
            // the known name collision between regions and interiors.
            warn!(
                cell = %pathgrid.cell,
                grid = %pathgrid.grid,
                "pathgrid cell name matches an interior cell but has a grid key; \
                 classifying as interior"
            );
        }

        if interior {
            self.interiors.insert(pathgrid.cell.to_lowercase(), pathgrid);
        } else {
            self.exteriors.insert(pathgrid.grid, pathgrid);
        }
        Ok(())
    }

    /// Look up the pathgrid of an interior cell by case-insensitive name.
    #[must_use]
    pub fn search_interior(&self, name: &str) -> Option<&Pathgrid> {
        self.interiors.get(&name.to_lowercase())
    }

    /// Look up the pathgrid of the exterior cell at `(x, y)`.
    #[must_use]
    pub fn search_exterior(&self, x: i32, y: i32) -> Option<&Pathgrid> {
        self.exteriors.get(&GridPos::new(x, y))
    }

    /// Look up the pathgrid belonging to a cell.
    #[must_use]
    pub fn search(&self, cell: &Cell) -> Option<&Pathgrid> {
        if cell.is_exterior() {
            self.search_exterior(cell.grid.x, cell.grid.y)
        } else {
            self.search_interior(&cell.name)
        }
    }

    /// Like [`PathgridStore::search_interior`], but absence is an error.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if the cell has no pathgrid.
    pub fn find_interior(&self, name: &str) -> Result<&Pathgrid> {
        self.search_interior(name)
            .ok_or_else(|| StoreError::not_found(name))
    }

    /// Like [`PathgridStore::search_exterior`], but absence is an error.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if the cell has no pathgrid.
    pub fn find_exterior(&self, x: i32, y: i32) -> Result<&Pathgrid> {
        self.search_exterior(x, y)
            .ok_or_else(|| StoreError::not_found(GridPos::new(x, y)))
    }

    /// Like [`PathgridStore::search`], but absence is an error.
    ///
    /// # Errors
    /// [`StoreError::NotFound`] if the cell has no pathgrid.
    pub fn find(&self, cell: &Cell) -> Result<&Pathgrid> {
        if cell.is_exterior() {
            self.find_exterior(cell.grid.x, cell.grid.y)
        } else {
            self.find_interior(&cell.name)
        }
    }

    /// Number of pathgrids across both kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.interiors.len() + self.exteriors.len()
    }

    /// True if no pathgrid has been loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interiors.is_empty() && self.exteriors.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
