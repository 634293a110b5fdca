// Offline trading support: a scriptable paper broker and a seeded
// synthetic bar generator, letting the full live loop run with no
// platform connection.
pub mod paper;
pub mod synthetic;

pub use paper::PaperBroker;
pub use synthetic::{generate_bars, Scenario};
