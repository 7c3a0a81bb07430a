//! HTML extractors.
//!
//! The board set is closed, so the registry is an exhaustive match from
//! [`BoardType`] to a selector table behind one [`HtmlExtractor`]
//! interface. [`generic`] holds the board-agnostic JSON-LD and heuristic
//! extractor used after the selector pass.

pub mod boards;
pub mod generic;
pub mod selector;

pub use boards::{table_for, SelectorTable};
pub use generic::{extract_generic, GenericExtraction, GenericSource};
pub use selector::{extract_field, run_table, SelectorExtraction};

use crate::types::board::BoardType;

/// A selector-based extractor for one board.
pub trait HtmlExtractor: Send + Sync {
    fn board(&self) -> BoardType;

    fn extract(&self, html: &str) -> SelectorExtraction;
}

/// Selector extractor driven by a static table.
#[derive(Debug, Clone, Copy)]
pub struct TableExtractor {
    board: BoardType,
    table: &'static SelectorTable,
}

impl TableExtractor {
    pub fn new(board: BoardType) -> Self {
        Self {
            board,
            table: table_for(board),
        }
    }
}

impl HtmlExtractor for TableExtractor {
    fn board(&self) -> BoardType {
        self.board
    }

    fn extract(&self, html: &str) -> SelectorExtraction {
        run_table(self.table, html)
    }
}

/// Maps each board to its extractor.
#[derive(Debug, Clone)]
pub struct ExtractorRegistry {
    extractors: Vec<TableExtractor>,
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        Self {
            extractors: BoardType::ALL.into_iter().map(TableExtractor::new).collect(),
        }
    }

    /// Extractor for `board`. Every board has one; unknown hosts get the
    /// generic microdata/class-name table.
    pub fn for_board(&self, board: BoardType) -> &dyn HtmlExtractor {
        match self.extractors.iter().find(|e| e.board == board) {
            Some(extractor) => extractor,
            None => &FALLBACK,
        }
    }
}

static FALLBACK: TableExtractor = TableExtractor {
    board: BoardType::Unknown,
    table: &boards::UNKNOWN,
};
