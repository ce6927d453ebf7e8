use std::cmp::min;

/// Smallest number `>= lower_limit` of the form `single_factor * multi_factor1^a * multi_factor2^b`.
fn smooth_len(lower_limit: usize, single_factor: usize, multi_factor1: usize, multi_factor2: usize) -> usize {
    let mut product = single_factor;
    while product < lower_limit {
        product *= multi_factor2
    }
    let mut best = product;
    loop {
        if product > lower_limit {
            if product % multi_factor2 != 0 {
                return best;
            }
            product /= multi_factor2;
        } else if product < lower_limit {
            product *= multi_factor1;
        } else {
            return product;
        }
        if product >= lower_limit && product < best {
            best = product;
        }
    }
}

/// Returns a convolution length no smaller than `lower_limit` that mostly consists of factors of 2 and 3,
/// with up to one other factor less than 12.
///
/// The chirp-z transform pads each lane to this length, so a short, smooth length keeps both
/// of its FFTs on the fast radix paths.
pub fn fastish_fft_len(lower_limit: usize) -> usize {
    let lower_limit = lower_limit.max(1);
    let mut x = lower_limit.next_power_of_two();
    for &alt in &[1, 5, 7, 11] {
        x = min(x, smooth_len(lower_limit, alt, 2, 3));
    }
    x
}

#[cfg(test)]
mod tests {
    use super::{fastish_fft_len, smooth_len};

    fn largest_rough_factor(mut x: usize) -> usize {
        for p in &[2, 3] {
            while x % p == 0 {
                x /= p;
            }
        }
        x
    }

    #[test]
    fn smooth_len_exact_hits() {
        assert_eq!(smooth_len(1, 1, 2, 3), 1);
        assert_eq!(smooth_len(12, 1, 2, 3), 12);
        assert_eq!(smooth_len(13, 1, 2, 3), 16);
        assert_eq!(smooth_len(17, 1, 2, 3), 18);
    }

    #[test]
    fn fastish_len_bounds() {
        for i in 1..=5_000usize {
            let x = fastish_fft_len(i);
            assert!(x >= i, "{} < {}", x, i);
            assert!(x <= i.next_power_of_two(), "{} {}", i, x);
            let rough = largest_rough_factor(x);
            assert!(rough < 12, "{} has factor {}", x, rough);
        }
    }

    #[test]
    fn fastish_len_prefers_seven() {
        // 189 = 7 * 3^3, 190 falls through to 2^6 * 3
        assert_eq!(fastish_fft_len(128), 128);
        assert_eq!(fastish_fft_len(189), 189);
        assert_eq!(fastish_fft_len(190), 192);
    }

    #[test]
    fn zero_is_treated_as_one() {
        assert_eq!(fastish_fft_len(0), 1);
    }
}
