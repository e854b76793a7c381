pub mod patch_matcher;
