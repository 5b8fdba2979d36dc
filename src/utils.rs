/// Utility helpers for background music

/// Clamp a volume into the `[0, 1]` range accepted by media elements.
/// NaN collapses to silence instead of propagating.
pub fn clamp_volume(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}

/// Parse a stored float like `parseFloat(raw) || 0`: the longest numeric
/// prefix counts, trailing junk is ignored. Anything missing, unparsable or
/// non-finite reads as zero.
pub fn parse_stored_f64(raw: Option<&str>) -> f64 {
    raw.map(|value| value.trim_start())
        .and_then(|value| value[..float_prefix_len(value)].parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}

/// Parse a stored epoch-millisecond timestamp like `parseInt(raw) || 0`:
/// leading decimal digits only, so `"1700000000000.9"` and `"-1e300"` stop at
/// the first non-digit. Out-of-range values saturate.
pub fn parse_stored_millis(raw: Option<&str>) -> i64 {
    let Some(value) = raw.map(str::trim_start) else {
        return 0;
    };
    let sign_len = sign_len(value);
    let digits = digit_run(&value[sign_len..]);
    if digits == 0 {
        return 0;
    }
    let prefix = &value[..sign_len + digits];
    match prefix.parse::<i64>() {
        Ok(millis) => millis,
        Err(_) if prefix.starts_with('-') => i64::MIN,
        Err(_) => i64::MAX,
    }
}

fn sign_len(value: &str) -> usize {
    usize::from(value.starts_with(['+', '-']))
}

fn digit_run(value: &str) -> usize {
    value.bytes().take_while(u8::is_ascii_digit).count()
}

// Length of `[sign] digits [. digits] [e [sign] digits]`, or 0 without a
// mantissa digit. The exponent only counts when it has digits of its own.
fn float_prefix_len(value: &str) -> usize {
    let mut end = sign_len(value);
    let int_digits = digit_run(&value[end..]);
    end += int_digits;

    let mut frac_digits = 0;
    if value[end..].starts_with('.') {
        frac_digits = digit_run(&value[end + 1..]);
        if int_digits > 0 || frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }
    if int_digits == 0 && frac_digits == 0 {
        return 0;
    }

    if value[end..].starts_with(['e', 'E']) {
        let exp_start = end + 1;
        let exp_sign = sign_len(&value[exp_start..]);
        let exp_digits = digit_run(&value[exp_start + exp_sign..]);
        if exp_digits > 0 {
            end = exp_start + exp_sign + exp_digits;
        }
    }
    end
}
