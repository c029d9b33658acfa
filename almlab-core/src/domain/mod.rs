//! Domain types shared by every pipeline stage.

pub mod bar;
pub mod panel;
pub mod signal_matrix;
pub mod timeframe;
pub mod weights;

pub use bar::Bar;
pub use panel::{MarketPanel, PanelError};
pub use signal_matrix::SignalMatrix;
pub use timeframe::{ParseTimeframeError, Timeframe};
pub use weights::{WeightSchedule, WeightVector};

/// Asset identifier, e.g. `BTC-USDT-SWAP`.
pub type Symbol = String;
