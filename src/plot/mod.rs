//! Terminal plots for the text presenter.

pub mod ascii;

pub use ascii::render_comparison_plot;
