//! Testing utilities and mock implementations.
//!
//! Provides a scriptable [`MockLookupClient`] so the pipeline can be exercised
//! without a real catalog service, plus fixtures for building inputs.
//!
//! # Example
//!
//! ```rust,ignore
//! use isbnfill_core::testing::{fixtures, MockLookupClient};
//!
//! let client = MockLookupClient::new();
//! client.set_latency(Duration::from_millis(5)).await;
//! client.set_jitter(Duration::from_millis(20)).await;
//!
//! let source = fixtures::books(100);
//! ```

mod mock_lookup_client;

pub use mock_lookup_client::MockLookupClient;

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::lookup::LookupOutcome;
    use crate::table::MemorySource;

    /// Title of the `i`th fixture book.
    pub fn title(i: usize) -> String {
        format!("Book {}", i)
    }

    /// Author of the `i`th fixture book.
    pub fn author(i: usize) -> String {
        format!("Author {}", i)
    }

    /// A deterministic 13-digit identifier for the `i`th fixture book.
    pub fn isbn13(i: usize) -> String {
        format!("978{:010}", i)
    }

    /// A `Found` outcome carrying [`isbn13`] for book `i`.
    pub fn found(i: usize) -> LookupOutcome {
        LookupOutcome::Found(isbn13(i))
    }

    /// `n` rows of `Title,Author` with a header.
    pub fn books(n: usize) -> MemorySource {
        MemorySource::new(
            ["Title", "Author"],
            (0..n).map(|i| vec![title(i), author(i)]),
        )
    }

    /// Two well known books, the first resolvable and the second not.
    pub fn dune_and_it() -> MemorySource {
        MemorySource::new(
            ["Title", "Author"],
            vec![vec!["Dune", "Frank Herbert"], vec!["It", "Stephen King"]],
        )
    }

    /// CSV text for `n` fixture books, header included.
    pub fn books_csv(n: usize) -> String {
        let mut text = String::from("Title,Author\n");
        for i in 0..n {
            text.push_str(&format!("{},{}\n", title(i), author(i)));
        }
        text
    }
}
