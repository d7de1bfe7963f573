//! Hash policy: full-content for small files, sampled prefix+suffix for
//! large videos.

use md5::{Digest, Md5};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use crate::config::{DedupConfig, HashAlgorithm};
use crate::error::DedupResult;
use midx_models::FileType;

fn digest_hex(algorithm: HashAlgorithm, bytes: &[u8]) -> String {
    match algorithm {
        HashAlgorithm::Md5 => {
            let mut hasher = Md5::new();
            hasher.update(bytes);
            hex::encode(hasher.finalize())
        }
        HashAlgorithm::Blake3 => blake3::hash(bytes).to_hex().to_string(),
    }
}

/// Compute the content fingerprint for `path`, applying the sampled-hash
/// policy to large videos per spec.md section 4.5.
///
/// Images, audio, and any file at or below `full_hash_threshold_bytes()`
/// are hashed over their entire contents. Larger videos are hashed over the
/// concatenation of their first and last `video_sample_bytes`.
pub async fn hash_file(path: &std::path::Path, file_type: FileType, config: &DedupConfig) -> DedupResult<String> {
    let metadata = tokio::fs::metadata(path).await?;
    let size = metadata.len();

    let use_sampled = file_type == FileType::Video && size > config.full_hash_threshold_bytes();

    if !use_sampled {
        let bytes = tokio::fs::read(path).await?;
        return Ok(digest_hex(config.algorithm, &bytes));
    }

    let sample = config.video_sample_bytes;
    let mut file = tokio::fs::File::open(path).await?;

    let mut prefix = vec![0u8; sample as usize];
    file.read_exact(&mut prefix).await?;

    let mut suffix = vec![0u8; sample as usize];
    file.seek(std::io::SeekFrom::End(-(sample as i64))).await?;
    file.read_exact(&mut suffix).await?;

    let mut combined = prefix;
    combined.extend_from_slice(&suffix);
    Ok(digest_hex(config.algorithm, &combined))
}
