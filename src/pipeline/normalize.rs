use rust_decimal::Decimal;

const HALF: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

/// Rescales a batch linearly onto [-1, 1]: the minimum maps to -1 and the
/// maximum to +1. A constant batch maps to all zeros; an empty batch to empty.
pub fn normalize(values: &[Decimal]) -> Vec<Decimal> {
    let (Some(min), Some(max)) = (values.iter().min().copied(), values.iter().max().copied())
    else {
        return Vec::new();
    };

    let range = max - min;
    if range.is_zero() {
        return vec![Decimal::ZERO; values.len()];
    }

    let two = Decimal::from(2);
    values
        .iter()
        .map(|w| ((w - min) / range - HALF) * two)
        .collect()
}
