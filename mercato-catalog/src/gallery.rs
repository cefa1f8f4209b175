//! Primary-image bookkeeping for a product's image list.
//!
//! A product with images always has exactly one primary image. The rules here
//! are applied by the in-memory store directly and mirrored in SQL by the
//! Postgres store.

use uuid::Uuid;

use crate::product::ProductImage;

/// Position a newly uploaded image should take (appended at the end).
pub fn next_position(images: &[ProductImage]) -> i32 {
    images.iter().map(|i| i.position + 1).max().unwrap_or(0)
}

/// Add an image. The first image of a product becomes primary; an image
/// explicitly flagged primary demotes the current one.
pub fn add(images: &mut Vec<ProductImage>, mut image: ProductImage) {
    let has_primary = images.iter().any(|i| i.is_primary);
    if image.is_primary {
        for existing in images.iter_mut() {
            existing.is_primary = false;
        }
    } else if !has_primary {
        image.is_primary = true;
    }
    images.push(image);
}

/// Make `image_id` the primary image. Returns false if it is not in the list.
pub fn set_primary(images: &mut [ProductImage], image_id: Uuid) -> bool {
    if !images.iter().any(|i| i.id == image_id) {
        return false;
    }
    for image in images.iter_mut() {
        image.is_primary = image.id == image_id;
    }
    true
}

/// Remove an image, promoting the lowest-positioned survivor when the primary goes.
pub fn remove(images: &mut Vec<ProductImage>, image_id: Uuid) -> bool {
    let Some(index) = images.iter().position(|i| i.id == image_id) else {
        return false;
    };
    let removed = images.remove(index);
    if removed.is_primary {
        if let Some(next) = images.iter_mut().min_by_key(|i| (i.position, i.created_at)) {
            next.is_primary = true;
        }
    }
    true
}

/// Primary first, then by position.
pub fn arrange(images: &mut [ProductImage]) {
    images.sort_by_key(|i| (!i.is_primary, i.position, i.created_at));
}

pub fn primary_url(images: &[ProductImage]) -> Option<&str> {
    images.iter().find(|i| i.is_primary).map(|i| i.url.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(product_id: Uuid, position: i32, primary: bool) -> ProductImage {
        ProductImage::new(product_id, format!("https://cdn.example.com/{}.jpg", position), String::new(), primary, position).unwrap()
    }

    #[test]
    fn test_first_image_becomes_primary() {
        let product_id = Uuid::new_v4();
        let mut images = Vec::new();
        add(&mut images, image(product_id, 0, false));
        add(&mut images, image(product_id, 1, false));
        assert!(images[0].is_primary);
        assert!(!images[1].is_primary);
        assert_eq!(next_position(&images), 2);
    }

    #[test]
    fn test_explicit_primary_demotes_existing() {
        let product_id = Uuid::new_v4();
        let mut images = Vec::new();
        add(&mut images, image(product_id, 0, false));
        add(&mut images, image(product_id, 1, true));
        assert_eq!(images.iter().filter(|i| i.is_primary).count(), 1);
        assert_eq!(primary_url(&images), Some("https://cdn.example.com/1.jpg"));
    }

    #[test]
    fn test_set_primary_and_arrange() {
        let product_id = Uuid::new_v4();
        let mut images = Vec::new();
        add(&mut images, image(product_id, 0, false));
        add(&mut images, image(product_id, 1, false));
        add(&mut images, image(product_id, 2, false));
        let target = images[2].id;

        assert!(set_primary(&mut images, target));
        assert!(!set_primary(&mut images, Uuid::new_v4()));
        arrange(&mut images);
        assert_eq!(images[0].id, target);
        assert_eq!(images[1].position, 0);
    }

    #[test]
    fn test_removing_primary_promotes_lowest_position() {
        let product_id = Uuid::new_v4();
        let mut images = Vec::new();
        add(&mut images, image(product_id, 0, false));
        add(&mut images, image(product_id, 1, false));
        add(&mut images, image(product_id, 2, false));
        let primary = images[0].id;

        assert!(remove(&mut images, primary));
        assert_eq!(images.len(), 2);
        assert!(images.iter().find(|i| i.position == 1).unwrap().is_primary);
        assert!(!remove(&mut images, primary));
    }

    #[test]
    fn test_no_images_no_primary() {
        assert_eq!(primary_url(&[]), None);
        assert_eq!(next_position(&[]), 0);
    }
}
