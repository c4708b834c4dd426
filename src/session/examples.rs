//! Example questions offered after connecting
//!
//! Each table contributes four templated questions to a pool; a handful are
//! drawn from the pool at random each time a session connects.

use rand::seq::SliceRandom;
use rand::Rng;

/// How many example questions are shown at once
pub const EXAMPLE_COUNT: usize = 5;

const TEMPLATES: [&str; 4] = [
    "Show all records from {table}",
    "How many rows are in {table}?",
    "List first 5 entries from {table}",
    "What are the column names in {table}?",
];

/// Every templated question for `tables`, grouped by table in input order
pub fn question_pool(tables: &[String]) -> Vec<String> {
    tables
        .iter()
        .flat_map(|table| TEMPLATES.iter().map(move |template| template.replace("{table}", table)))
        .collect()
}

/// Uniform sample of up to [`EXAMPLE_COUNT`] distinct questions
///
/// A pool smaller than the sample size is returned whole, in shuffled order.
pub fn sample_questions<R: Rng + ?Sized>(mut pool: Vec<String>, rng: &mut R) -> Vec<String> {
    let (picked, _) = pool.partial_shuffle(rng, EXAMPLE_COUNT);
    picked.to_vec()
}
