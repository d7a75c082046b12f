use crate::types::PhotoSize;

/// File id of the largest size of a sent photo.
///
/// Sizes are compared by `file_size` when every size reports one, otherwise
/// by pixel area.
pub fn biggest_photo_file_id(sizes: &[PhotoSize]) -> Option<&str> {
    let all_sized = sizes.iter().all(|s| s.file_size.is_some());
    sizes
        .iter()
        .max_by_key(|s| {
            if all_sized {
                s.file_size.unwrap_or_default()
            } else {
                u64::from(s.width) * u64::from(s.height)
            }
        })
        .map(|s| s.file_id.as_str())
}
