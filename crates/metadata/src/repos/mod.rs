//! Repository traits for metadata operations.
//!
//! Every repository is implemented for [`sqlx::SqliteConnection`], so the same
//! calls run on a pooled connection or on the transaction held by a
//! [`UnitOfWork`](crate::UnitOfWork).

pub mod galleries;
pub mod images;
pub mod profiles;
pub mod references;

pub use galleries::GalleryRepo;
pub use images::ImageRepo;
pub use profiles::ProfileImageRepo;
pub use references::ReferenceRepo;

use std::fmt;

/// Single-reference owners: one nullable profile-image column per row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProfileSite {
    Artist,
    Group,
    User,
}

impl ProfileSite {
    pub const ALL: [ProfileSite; 3] = [ProfileSite::Artist, ProfileSite::Group, ProfileSite::User];

    pub(crate) fn table(self) -> &'static str {
        match self {
            ProfileSite::Artist => "artists",
            ProfileSite::Group => "\"groups\"",
            ProfileSite::User => "users",
        }
    }

    pub(crate) fn owner_column(self) -> &'static str {
        match self {
            ProfileSite::Artist => "artist_id",
            ProfileSite::Group => "group_id",
            ProfileSite::User => "user_id",
        }
    }
}

/// Multi-reference owners: ordered mapping rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GallerySite {
    Event,
    Review,
}

impl GallerySite {
    pub const ALL: [GallerySite; 2] = [GallerySite::Event, GallerySite::Review];

    pub(crate) fn table(self) -> &'static str {
        match self {
            GallerySite::Event => "event_images",
            GallerySite::Review => "review_images",
        }
    }

    pub(crate) fn owner_column(self) -> &'static str {
        match self {
            GallerySite::Event => "event_id",
            GallerySite::Review => "review_id",
        }
    }
}

/// Every place an image can be referenced from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReferenceSite {
    ArtistProfile,
    GroupProfile,
    UserProfile,
    EventGallery,
    ReviewGallery,
}

impl ReferenceSite {
    pub const ALL: [ReferenceSite; 5] = [
        ReferenceSite::ArtistProfile,
        ReferenceSite::GroupProfile,
        ReferenceSite::UserProfile,
        ReferenceSite::EventGallery,
        ReferenceSite::ReviewGallery,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ReferenceSite::ArtistProfile => "artist_profile",
            ReferenceSite::GroupProfile => "group_profile",
            ReferenceSite::UserProfile => "user_profile",
            ReferenceSite::EventGallery => "event_gallery",
            ReferenceSite::ReviewGallery => "review_gallery",
        }
    }

    /// `(table, image column)` holding the reference.
    pub(crate) fn reference_column(self) -> (&'static str, &'static str) {
        match self {
            ReferenceSite::ArtistProfile => (ProfileSite::Artist.table(), "profile_image_id"),
            ReferenceSite::GroupProfile => (ProfileSite::Group.table(), "profile_image_id"),
            ReferenceSite::UserProfile => (ProfileSite::User.table(), "profile_image_id"),
            ReferenceSite::EventGallery => (GallerySite::Event.table(), "image_id"),
            ReferenceSite::ReviewGallery => (GallerySite::Review.table(), "image_id"),
        }
    }
}

impl From<ProfileSite> for ReferenceSite {
    fn from(site: ProfileSite) -> Self {
        match site {
            ProfileSite::Artist => ReferenceSite::ArtistProfile,
            ProfileSite::Group => ReferenceSite::GroupProfile,
            ProfileSite::User => ReferenceSite::UserProfile,
        }
    }
}

impl From<GallerySite> for ReferenceSite {
    fn from(site: GallerySite) -> Self {
        match site {
            GallerySite::Event => ReferenceSite::EventGallery,
            GallerySite::Review => ReferenceSite::ReviewGallery,
        }
    }
}

impl fmt::Display for ReferenceSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
