use super::*;

fn word_with(osc32k: u32, coarse: u32) -> u32 {
    (osc32k << 6) | (coarse << 26)
}

#[test]
fn field_positions_match_otp4_layout() {
    // OSC32K_CAL at [12:6] and DFLL48M_COARSE_CAL at [31:26] of OTP4 + 4.
    let word = CalibrationWord::from(word_with(0x55, 0x2A));
    assert_eq!(word.osc32k_cal(), 0x55);
    assert_eq!(word.dfll48m_coarse_cal(), 0x2A);
    assert_eq!(word.adc_linearity_hi(), 0);
    assert_eq!(word.usb_trim(), 0);
}

#[test]
fn neighbouring_usb_fields_do_not_leak_into_trims() {
    // Everything except the two trims set.
    let raw = !word_with(0x7F, 0x3F);
    let word = CalibrationWord::from(raw);
    assert_eq!(word.osc32k_cal(), 0);
    assert_eq!(word.dfll48m_coarse_cal(), 0);
    assert_eq!(word.usb_transn(), 0x1F);
    assert_eq!(word.usb_transp(), 0x1F);
    assert_eq!(word.usb_trim(), 0x7);
    assert_eq!(word.adc_biascal(), 0x7);
}

#[test]
fn sentinel_coarse_is_replaced_with_half_scale() {
    for osc in [0u32, 0x01, 0x40, 0x7F] {
        let cal = read_calibration(&word_with(osc, 0x3F));
        assert_eq!(cal.dfll_coarse, DFLL_COARSE_FALLBACK);
        assert_eq!(cal.osc32k as u32, osc);
    }
}

#[test]
fn every_valid_coarse_passes_through() {
    for coarse in 0..=0x3Eu32 {
        let cal = read_calibration(&word_with(0x40, coarse));
        assert_eq!(cal.dfll_coarse as u32, coarse);
    }
}

#[test]
fn osc32k_trim_is_used_verbatim() {
    for osc in 0..=0x7Fu32 {
        let cal = read_calibration(&word_with(osc, 0x10));
        assert_eq!(cal.osc32k as u32, osc);
    }
}

#[test]
fn all_ones_word_still_yields_usable_coarse() {
    let cal = read_calibration(&u32::MAX);
    assert_eq!(cal.osc32k, 0x7F);
    assert_eq!(cal.dfll_coarse, 0x1F);
}
