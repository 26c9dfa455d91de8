pub mod contour;
pub mod correction;
pub mod detections;
pub mod fundamental;
pub mod peaks;
pub mod polyfit;
pub mod ridge;
pub mod savgol;
pub mod spectrum;
pub mod spline;
pub mod template;
pub mod valley;
