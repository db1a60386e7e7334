pub mod about;
pub mod navigation;
pub mod notice;
pub mod review_form;
pub mod reviews_list;
pub mod star_rating;
