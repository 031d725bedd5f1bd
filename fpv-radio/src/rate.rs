//! Applying a [`fpv_wire::WifiRate`] to the radio driver: the legacy-rate
//! code carried in the radiotap `rate` field (500 kbps units) for the B/G
//! entries, and the `RateSetter` side-effect boundary spec §4.F dispatches
//! into on a `Config` packet (spec §6: "failure is fatal and halts").

pub use fpv_wire::WifiRate;

#[derive(Debug, thiserror::Error)]
#[error("radio driver rejected rate {0:?}")]
pub struct NotSupported(pub WifiRate);

/// The external radio driver's rate-setting side effect (spec §1: the radio
/// driver itself is out of scope; this is the narrow boundary the transport
/// calls into). A real driver implementation lives outside this crate.
pub trait RateSetter {
    /// Applies `rate`, or returns [`NotSupported`] (spec §6: "failure is
    /// fatal and halts").
    fn set_rate(&mut self, rate: WifiRate) -> Result<(), NotSupported>;
}

/// The legacy radiotap `rate` field value for a B/G entry, in units of
/// 500 kbps (`IEEE80211_RADIOTAP_RATE`). `N` (MCS) entries have no legacy
/// rate code — the radio driver instead selects them via the radiotap `MCS`
/// field (spec §6), so this returns `None` for those.
pub fn legacy_rate_code(rate: WifiRate) -> Option<u8> {
    use WifiRate::*;
    Some(match rate {
        B2MCck | B2MCckShort => 4,
        B5_5MCck | B5_5MCckShort => 11,
        B11MCck | B11MCckShort => 22,
        G6MOfdm => 12,
        G9MOfdm => 18,
        G12MOfdm => 24,
        G18MOfdm => 36,
        G24MOfdm => 48,
        G36MOfdm => 72,
        G48MOfdm => 96,
        G54MOfdm => 108,
        _ => return None,
    })
}

/// The MCS index carried in the radiotap `MCS` field for an `N` entry, or
/// `None` for a legacy B/G entry.
pub fn mcs_index(rate: WifiRate) -> Option<u8> {
    use WifiRate::*;
    Some(match rate {
        N6_5MMcs0 | N7_2MMcs0Short => 0,
        N13MMcs1 | N14_4MMcs1Short => 1,
        N19_5MMcs2 | N21_7MMcs2Short => 2,
        N26MMcs3 | N28_9MMcs3Short => 3,
        N39MMcs4 | N43_3MMcs4Short => 4,
        N52MMcs5 | N57_8MMcs5Short => 5,
        N58MMcs6 | N65MMcs6Short => 6,
        N65MMcs7 | N72MMcs7Short => 7,
        _ => return None,
    })
}

/// Whether `rate` uses the short-guard-interval/short-preamble variant of
/// its modulation, per the `_Short` suffix in [`WifiRate`]'s 30-entry table.
pub fn is_short_variant(rate: WifiRate) -> bool {
    use WifiRate::*;
    matches!(
        rate,
        B2MCckShort
            | B5_5MCckShort
            | B11MCckShort
            | N7_2MMcs0Short
            | N14_4MMcs1Short
            | N21_7MMcs2Short
            | N28_9MMcs3Short
            | N43_3MMcs4Short
            | N57_8MMcs5Short
            | N65MMcs6Short
            | N72MMcs7Short
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_and_mcs_codes_are_mutually_exclusive() {
        for i in 0..fpv_wire::control::WIFI_RATE_COUNT {
            let rate = WifiRate::from_u8(i).unwrap();
            assert_ne!(
                legacy_rate_code(rate).is_some(),
                mcs_index(rate).is_some(),
                "{rate:?} should carry exactly one rate code kind"
            );
        }
    }

    #[test]
    fn short_variants_are_the_odd_indices_within_each_pair() {
        assert!(is_short_variant(WifiRate::B2MCckShort));
        assert!(!is_short_variant(WifiRate::B2MCck));
        assert!(is_short_variant(WifiRate::N72MMcs7Short));
        assert!(!is_short_variant(WifiRate::G54MOfdm));
    }
}
