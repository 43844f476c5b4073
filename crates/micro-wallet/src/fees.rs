//! Transaction size and fee estimation.
//!
//! Sizes are estimated in weight units before signing, assuming 72-byte DER
//! signatures and compressed public keys. Fee rates are in smallest units
//! per 1000 virtual bytes, the unit indexers and nodes report.

use micro_core::types::ScriptType;

/// Version, input/output counts and lock time: 10 bytes.
pub const TX_OVERHEAD_WEIGHT: u64 = 40;

/// Segwit marker and flag bytes, counted at witness weight.
pub const SEGWIT_MARKER_WEIGHT: u64 = 2;

/// Spend of a P2PKH output: 148 bytes, no witness.
pub const P2PKH_INPUT_WEIGHT: u64 = 592;

/// Spend of a P2SH-P2WPKH output: 64 bytes plus a 108-byte witness.
pub const P2SH_P2WPKH_INPUT_WEIGHT: u64 = 364;

/// Spend of a P2WPKH output: 41 bytes plus a 108-byte witness.
pub const P2WPKH_INPUT_WEIGHT: u64 = 272;

/// Weight of spending an output of `script_type`.
pub fn input_weight(script_type: ScriptType) -> u64 {
    match script_type {
        ScriptType::P2pkh => P2PKH_INPUT_WEIGHT,
        ScriptType::P2shP2wpkh => P2SH_P2WPKH_INPUT_WEIGHT,
        ScriptType::P2wpkh => P2WPKH_INPUT_WEIGHT,
    }
}

/// Weight of an output with a `script_len`-byte script: value, length, script.
pub fn output_weight(script_len: usize) -> u64 {
    (8 + 1 + script_len as u64) * 4
}

/// Estimated virtual size of a transaction spending `inputs` into outputs
/// with the given script lengths.
pub fn estimate_vsize<I, O>(inputs: I, output_script_lens: O) -> u64
where
    I: IntoIterator<Item = ScriptType>,
    O: IntoIterator<Item = usize>,
{
    let mut weight = TX_OVERHEAD_WEIGHT;
    let mut segwit = false;
    for script_type in inputs {
        segwit |= script_type.is_segwit();
        weight += input_weight(script_type);
    }
    if segwit {
        weight += SEGWIT_MARKER_WEIGHT;
    }
    weight += output_script_lens.into_iter().map(output_weight).sum::<u64>();
    weight.div_ceil(4)
}

/// Fee for `vsize` virtual bytes at `rate_per_kvb`, rounded up.
pub fn fee_for_vsize(vsize: u64, rate_per_kvb: u64) -> u64 {
    let fee = (vsize as u128 * rate_per_kvb as u128).div_ceil(1000);
    u64::try_from(fee).unwrap_or(u64::MAX)
}

/// Fee rate actually charged: `requested`, but never below `min_relay`.
pub fn effective_rate(requested: u64, min_relay: u64) -> u64 {
    requested.max(min_relay)
}

/// Effective fee rate of a built transaction, per 1000 virtual bytes.
pub fn rate_of(fee: u64, vsize: u64) -> u64 {
    if vsize == 0 {
        return 0;
    }
    u64::try_from(fee as u128 * 1000 / vsize as u128).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    const P2WPKH_SCRIPT: usize = 22;
    const P2PKH_SCRIPT: usize = 25;

    #[test]
    fn native_segwit_one_in_two_out() {
        // 40 + 2 + 272 + 2 * 124 = 562 wu
        let vsize = estimate_vsize([ScriptType::P2wpkh], [P2WPKH_SCRIPT, P2WPKH_SCRIPT]);
        assert_eq!(vsize, 141);
    }

    #[test]
    fn legacy_has_no_marker() {
        // 40 + 592 + 136 = 768 wu
        let vsize = estimate_vsize([ScriptType::P2pkh], [P2PKH_SCRIPT]);
        assert_eq!(vsize, 192);
    }

    #[test]
    fn mixed_inputs() {
        let vsize = estimate_vsize(
            [ScriptType::P2pkh, ScriptType::P2shP2wpkh],
            [P2PKH_SCRIPT],
        );
        // 40 + 2 + 592 + 364 + 136 = 1134 wu
        assert_eq!(vsize, 284);
    }

    #[test]
    fn fee_rounds_up() {
        assert_eq!(fee_for_vsize(141, 1_000), 141);
        assert_eq!(fee_for_vsize(141, 1_001), 142);
        assert_eq!(fee_for_vsize(1, 1), 1);
        assert_eq!(fee_for_vsize(0, 10_000), 0);
        assert_eq!(fee_for_vsize(u64::MAX, u64::MAX), u64::MAX);
    }

    #[test]
    fn relay_floor() {
        assert_eq!(effective_rate(500, 1_000), 1_000);
        assert_eq!(effective_rate(5_000, 1_000), 5_000);
    }

    #[test]
    fn rate_of_built_tx() {
        assert_eq!(rate_of(1_410, 141), 10_000);
        assert_eq!(rate_of(100, 0), 0);
    }
}
