//! Containers whose memory comes from an `AllocatorRef`

mod bucket_array;
mod fixed_list;
mod list;


pub use bucket_array::{BucketArray, BucketIndex, Iter, IterMut};
pub use fixed_list::FixedList;
pub use list::{sprint, tprint, List, StringBuilder};
