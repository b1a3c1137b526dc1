//! Version ordering as pacman sees it: `[epoch:]version[-release]`.

use std::cmp::Ordering;

/// Split `[epoch:]version[-release]`, epoch defaults to `"0"`.
fn parse_evr(evr: &str) -> (&str, &str, Option<&str>) {
    let digits = evr.bytes().take_while(u8::is_ascii_digit).count();
    let (epoch, rest) = if evr.as_bytes().get(digits) == Some(&b':') {
        let epoch = &evr[..digits];
        (if epoch.is_empty() { "0" } else { epoch }, &evr[digits + 1..])
    } else {
        ("0", evr)
    };
    match rest.rsplit_once('-') {
        Some((version, release)) => (epoch, version, Some(release)),
        None => (epoch, rest, None),
    }
}

/// Segment-wise comparison of a single version component, the way
/// rpm/pacman do it: alphanumeric segments separated by anything else,
/// numeric segments compared as numbers, alpha segments as strings,
/// numbers always newer than letters.
fn segment_cmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal
    }
    let one = a.as_bytes();
    let two = b.as_bytes();
    let (mut i, mut j) = (0, 0);
    while i < one.len() && j < two.len() {
        let (sep_i, sep_j) = (i, j);
        while i < one.len() && !one[i].is_ascii_alphanumeric() {
            i += 1
        }
        while j < two.len() && !two[j].is_ascii_alphanumeric() {
            j += 1
        }
        if i >= one.len() || j >= two.len() {
            break
        }
        // Different separator lengths settle it
        if i - sep_i != j - sep_j {
            return (i - sep_i).cmp(&(j - sep_j))
        }
        let is_num = one[i].is_ascii_digit();
        let belongs: fn(&u8) -> bool = if is_num {
            u8::is_ascii_digit
        } else {
            u8::is_ascii_alphabetic
        };
        let end_i = i + one[i..].iter().take_while(|c| belongs(c)).count();
        let end_j = j + two[j..].iter().take_while(|c| belongs(c)).count();
        // Numeric segment against alpha segment
        if end_j == j {
            return if is_num { Ordering::Greater } else { Ordering::Less }
        }
        let mut seg_one = &one[i..end_i];
        let mut seg_two = &two[j..end_j];
        if is_num {
            while seg_one.first() == Some(&b'0') {
                seg_one = &seg_one[1..]
            }
            while seg_two.first() == Some(&b'0') {
                seg_two = &seg_two[1..]
            }
            match seg_one.len().cmp(&seg_two.len()) {
                Ordering::Equal => (),
                other => return other,
            }
        }
        match seg_one.cmp(seg_two) {
            Ordering::Equal => (),
            other => return other,
        }
        i = end_i;
        j = end_j;
    }
    let rest_one = &one[i..];
    let rest_two = &two[j..];
    if rest_one.is_empty() && rest_two.is_empty() {
        return Ordering::Equal
    }
    // A remaining alpha tail never beats an empty string
    let first_alpha = |s: &[u8]| s.first().is_some_and(u8::is_ascii_alphabetic);
    if (rest_one.is_empty() && !first_alpha(rest_two)) || first_alpha(rest_one) {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

/// Compare two full package versions.
///
/// The release part is only considered when both sides carry one, so
/// `1.0` and `1.0-3` compare equal.
pub fn vercmp(a: &str, b: &str) -> Ordering {
    if a == b {
        return Ordering::Equal
    }
    let (epoch_a, version_a, release_a) = parse_evr(a);
    let (epoch_b, version_b, release_b) = parse_evr(b);
    segment_cmp(epoch_a, epoch_b)
        .then_with(|| segment_cmp(version_a, version_b))
        .then_with(|| match (release_a, release_b) {
            (Some(release_a), Some(release_b)) =>
                segment_cmp(release_a, release_b),
            _ => Ordering::Equal,
        })
}
