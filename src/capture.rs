//! Rastérisation de l'état visuel d'un écran.
//!
//! Un [`Snapshot`] est une image RGBA 8 bits non prémultipliée, en pixels
//! physiques de l'écran ([`ScreenPixel`]). La capture elle-même est fournie
//! par l'hôte via le trait [`ScreenCapture`] : le guard ne sait pas comment
//! l'écran est dessiné.

use euclid::Size2D;

/// Unité des pixels physiques d'un écran gardé.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenPixel;

pub type ScreenSize = Size2D<u32, ScreenPixel>;

/// Un pixel RGBA, composantes 0–255.
pub type Rgba = [u8; 4];

/// Image capturée d'un écran.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    size: ScreenSize,
    pixels: Vec<Rgba>,
}

impl Snapshot {
    /// Construit un snapshot. Retourne `None` si le buffer ne correspond pas
    /// à la taille annoncée.
    pub fn new(size: ScreenSize, pixels: Vec<Rgba>) -> Option<Self> {
        let expected = size.width as usize * size.height as usize;
        (pixels.len() == expected).then_some(Self { size, pixels })
    }

    /// Snapshot uni, utile pour les écrans de remplacement et les tests.
    pub fn filled(size: ScreenSize, color: Rgba) -> Self {
        let len = size.width as usize * size.height as usize;
        Self {
            size,
            pixels: vec![color; len],
        }
    }

    pub fn size(&self) -> ScreenSize {
        self.size
    }

    pub fn width(&self) -> u32 {
        self.size.width
    }

    pub fn height(&self) -> u32 {
        self.size.height
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn pixels(&self) -> &[Rgba] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [Rgba] {
        &mut self.pixels
    }

    /// Pixel en (x, y). Panique hors limites, comme un index de slice.
    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        self.pixels[pixel_index(self.size.width, x, y)]
    }
}

/// Index row-major de (x, y), calculé en `usize` : w × h peut dépasser `u32`.
fn pixel_index(width: u32, x: u32, y: u32) -> usize {
    y as usize * width as usize + x as usize
}

/// Rastérise l'écran `S` tel qu'il est affiché à l'instant de l'appel.
///
/// Retourner `None` (surface de taille nulle, pas encore de frame) n'est
/// jamais une erreur fatale : le guard considère qu'il n'y a rien à flouter.
pub trait ScreenCapture<S: ?Sized> {
    fn capture(&self, screen: &S) -> Option<Snapshot>;
}

/// Toute closure `Fn(&S) -> Option<Snapshot>` est une capture valide.
impl<S: ?Sized, F> ScreenCapture<S> for F
where
    F: Fn(&S) -> Option<Snapshot>,
{
    fn capture(&self, screen: &S) -> Option<Snapshot> {
        self(screen)
    }
}
