use md5::{Digest, Md5};

use crate::{constants::SHORT_CODE_LENGTH, schema::Id};

/// First 8 hex characters of the MD5 digest of the decimal recipe id.
///
/// Pure and stateless. Distinct ids may collide after truncation; no attempt
/// is made to detect it.
pub fn short_code(recipe_id: Id) -> String {
    let digest = Md5::digest(recipe_id.to_string().as_bytes());
    hex::encode(&digest[..SHORT_CODE_LENGTH / 2])
}

/// Appends the code to `base_url` as is, so the base decides the separator.
pub fn short_link(base_url: &str, recipe_id: Id) -> String {
    format!("{base_url}{}", short_code(recipe_id))
}
