/// `part` as a percentage of `whole`; 0 when `whole` is 0
pub fn percentage(part: u64, whole: u64) -> f64 {
    match whole {
        0 => 0.0,
        positive => part as f64 / positive as f64 * 100.0,
    }
}

pub fn mean(data: &[f64]) -> Option<f64> {
    let sum = data.iter().sum::<f64>();
    let count = data.len();

    match count {
        positive if positive > 0 => Some(sum / count as f64),
        _ => None,
    }
}
