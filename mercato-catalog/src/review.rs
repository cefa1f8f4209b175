use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const MIN_RATING: i16 = 1;
pub const MAX_RATING: i16 = 5;
const MAX_MERCHANT_COMMENT_LEN: usize = 500;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductReview {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub rating: i16,
    pub comment: String,
    pub is_verified_purchase: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductReview {
    pub fn new(
        product_id: Uuid,
        user_id: Uuid,
        rating: i16,
        comment: String,
        is_verified_purchase: bool,
    ) -> Result<Self, ReviewError> {
        validate_rating(rating)?;
        let comment = comment.trim().to_string();
        if comment.is_empty() {
            return Err(ReviewError::EmptyComment);
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            product_id,
            user_id,
            rating,
            comment,
            is_verified_purchase,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MerchantReview {
    pub id: Uuid,
    pub merchant_id: Uuid,
    pub user_id: Uuid,
    pub rating: i16,
    pub comment: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MerchantReview {
    pub fn new(merchant_id: Uuid, user_id: Uuid, rating: i16, comment: String) -> Result<Self, ReviewError> {
        validate_rating(rating)?;
        let comment = comment.trim().to_string();
        if comment.is_empty() {
            return Err(ReviewError::EmptyComment);
        }
        if comment.chars().count() > MAX_MERCHANT_COMMENT_LEN {
            return Err(ReviewError::CommentTooLong(MAX_MERCHANT_COMMENT_LEN));
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            merchant_id,
            user_id,
            rating,
            comment,
            created_at: now,
            updated_at: now,
        })
    }
}

fn validate_rating(rating: i16) -> Result<(), ReviewError> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(ReviewError::RatingOutOfRange(rating));
    }
    Ok(())
}

/// Average rating (one decimal) and number of reviews.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct RatingSummary {
    pub average: Option<f64>,
    pub count: i64,
}

impl RatingSummary {
    pub fn from_ratings<I>(ratings: I) -> Self
    where
        I: IntoIterator<Item = i16>,
    {
        let (sum, count) = ratings
            .into_iter()
            .fold((0i64, 0i64), |(sum, count), r| (sum + i64::from(r), count + 1));
        Self::from_totals(sum, count)
    }

    pub fn from_totals(sum: i64, count: i64) -> Self {
        if count == 0 {
            return Self::default();
        }
        let average = (sum as f64 / count as f64 * 10.0).round() / 10.0;
        Self { average: Some(average), count }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    #[error("Rating must be between 1 and 5, got {0}")]
    RatingOutOfRange(i16),

    #[error("Review comment is required")]
    EmptyComment,

    #[error("Review comment must be at most {0} characters")]
    CommentTooLong(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rating_bounds() {
        assert!(ProductReview::new(Uuid::new_v4(), Uuid::new_v4(), 0, "meh".into(), false).is_err());
        assert!(ProductReview::new(Uuid::new_v4(), Uuid::new_v4(), 6, "wow".into(), false).is_err());
        assert!(ProductReview::new(Uuid::new_v4(), Uuid::new_v4(), 5, "great".into(), true).is_ok());
    }

    #[test]
    fn test_comment_rules() {
        assert!(matches!(
            ProductReview::new(Uuid::new_v4(), Uuid::new_v4(), 4, "   ".into(), false),
            Err(ReviewError::EmptyComment)
        ));
        let long = "x".repeat(501);
        assert!(matches!(
            MerchantReview::new(Uuid::new_v4(), Uuid::new_v4(), 4, long),
            Err(ReviewError::CommentTooLong(500))
        ));
    }

    #[test]
    fn test_rating_summary() {
        assert_eq!(RatingSummary::from_ratings(Vec::new()), RatingSummary::default());
        let summary = RatingSummary::from_ratings([5, 4, 4]);
        assert_eq!(summary.count, 3);
        assert_eq!(summary.average, Some(4.3));
    }
}
