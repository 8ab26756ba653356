pub mod comic_days;
pub mod gigaviewer;
pub mod ourfeel;
pub mod pocket_magazine;
