//! Startup-level failures (spec §6 exit codes, §7: "radio init and rate-set
//! failures" are the only ones that are fatal). Everything on the hot path
//! instead increments a [`crate::stats::Stats`] counter and never returns a
//! `Result`.

#[derive(Debug, thiserror::Error)]
pub enum FpvError {
    #[error("FEC setup failed: {0}")]
    Fec(#[from] fpv_fec::encoder::Error),
    #[error("radio interface open failed: {0}")]
    RadioOpen(String),
    #[error("radio driver rejected rate: {0}")]
    RateSet(#[from] fpv_radio::NotSupported),
    #[error("config field out of range: {0}")]
    InvalidConfig(&'static str),
}
