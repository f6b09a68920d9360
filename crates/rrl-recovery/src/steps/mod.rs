//! Concrete workflow steps
//!
//! - [`ReferenceDeviceStep`]: predicate device candidates
//! - [`LiteratureStep`]: supporting publications

use rrl_profile::profile::DEFAULT_NAME;
use rrl_profile::DeviceProfile;

mod literature;
mod reference_device;

pub use literature::{LiteratureQuery, LiteratureStep, Publication};
pub use reference_device::{ReferenceCriteria, ReferenceDevice, ReferenceDeviceStep};

/// Lower-cased words of the trade name worth searching for
fn name_keywords(profile: &DeviceProfile) -> Vec<String> {
    if profile.name == DEFAULT_NAME {
        return Vec::new();
    }
    let mut words: Vec<String> = profile
        .name
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() >= 3)
        .map(str::to_lowercase)
        .collect();
    words.dedup();
    words
}

/// Stable number derived from the fields placeholders are built from
fn profile_seed(profile: &DeviceProfile) -> u32 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(profile.product_code.as_bytes());
    hasher.update(b"\0");
    hasher.update(profile.device_class.as_bytes());
    hasher.update(b"\0");
    hasher.update(profile.name.as_bytes());
    let bytes = hasher.finalize();
    let head = bytes.as_bytes();
    u32::from_le_bytes([head[0], head[1], head[2], head[3]])
}

fn letter(index: usize) -> char {
    const LETTERS: &[u8; 26] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
    char::from(LETTERS[index % LETTERS.len()])
}
