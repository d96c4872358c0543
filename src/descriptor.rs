//! セットシンボルの画像特徴量
//!
//! 記述子の中身は解釈せず、距離だけを使う。距離は小さいほど似ている。

use image::DynamicImage;
use image_hasher::{HashAlg, HasherConfig, ImageHash};

pub trait SymbolDescriptor: Send + Sync {
    type Descriptor;

    fn describe(&self, image: &DynamicImage) -> Self::Descriptor;

    /// 2つの記述子の距離（0 = 同一）
    fn distance(&self, a: &Self::Descriptor, b: &Self::Descriptor) -> f64;

    fn image_distance(&self, a: &DynamicImage, b: &DynamicImage) -> f64 {
        self.distance(&self.describe(a), &self.describe(b))
    }
}

/// 勾配ハッシュ + ハミング距離
#[derive(Debug, Clone, Copy)]
pub struct PerceptualHashDescriptor {
    hash_size: u32,
}

impl Default for PerceptualHashDescriptor {
    fn default() -> Self {
        Self { hash_size: 16 }
    }
}

impl PerceptualHashDescriptor {
    pub fn new(hash_size: u32) -> Self {
        Self {
            hash_size: hash_size.max(2),
        }
    }
}

impl SymbolDescriptor for PerceptualHashDescriptor {
    type Descriptor = ImageHash;

    fn describe(&self, image: &DynamicImage) -> ImageHash {
        let hasher = HasherConfig::new()
            .hash_alg(HashAlg::Gradient)
            .hash_size(self.hash_size, self.hash_size)
            .to_hasher();
        hasher.hash_image(image)
    }

    fn distance(&self, a: &ImageHash, b: &ImageHash) -> f64 {
        a.dist(b) as f64
    }
}
