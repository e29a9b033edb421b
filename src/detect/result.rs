/// Axis-aligned face rectangle in image pixel coordinates (right/bottom exclusive).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaceBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl FaceBox {
    pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> i32 {
        self.right - self.left
    }

    pub fn height(&self) -> i32 {
        self.bottom - self.top
    }

    /// Center of the box in pixel coordinates.
    pub fn center(&self) -> (f32, f32) {
        (
            (self.left as f32 + self.right as f32) * 0.5,
            (self.top as f32 + self.bottom as f32) * 0.5,
        )
    }
}

/// Outcome of analyzing one frame, in raw (unrotated) image pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum Detection {
    #[default]
    NoFace,
    Face { center_x: f32, center_y: f32 },
}

impl Detection {
    /// Take the first face the detector reported. The anchor is the box center on
    /// both axes.
    pub fn from_faces(faces: &[FaceBox]) -> Self {
        match faces.first() {
            Some(face) => {
                let (center_x, center_y) = face.center();
                Self::Face { center_x, center_y }
            }
            None => Self::NoFace,
        }
    }

    pub fn is_face(&self) -> bool {
        matches!(self, Self::Face { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_face_center_is_used() {
        let faces = [FaceBox::new(300, 200, 340, 280), FaceBox::new(0, 0, 10, 10)];
        assert_eq!(
            Detection::from_faces(&faces),
            Detection::Face {
                center_x: 320.0,
                center_y: 240.0
            }
        );
    }

    #[test]
    fn no_faces_is_no_face() {
        assert_eq!(Detection::from_faces(&[]), Detection::NoFace);
        assert!(!Detection::default().is_face());
    }

    #[test]
    fn odd_extent_keeps_fractional_center() {
        let face = FaceBox::new(0, 0, 5, 3);
        assert_eq!(face.center(), (2.5, 1.5));
        assert_eq!(face.width(), 5);
        assert_eq!(face.height(), 3);
    }
}
