// ============================================
// Noise Functions - Сидированный value noise
// ============================================
//
// Целочисленный хеш решётки + smoothstep интерполяция.
// Сид входит в хеш, поэтому одинаковый сид даёт одинаковое поле.
// Те же константы используются в WGSL ядре (marching_cubes.wgsl).

const PRIME_X: i32 = 374761393;
const PRIME_Y: i32 = 668265263;
const PRIME_Z: i32 = 1274126177;
const PRIME_SEED: i32 = 1013904223;
const MIX: i32 = 1911520717;

/// Hash3D возвращает значение в диапазоне 0.0..1.0
#[inline(always)]
pub fn hash3d(x: i32, y: i32, z: i32, seed: i32) -> f32 {
    let n = x.wrapping_mul(PRIME_X)
        .wrapping_add(y.wrapping_mul(PRIME_Y))
        .wrapping_add(z.wrapping_mul(PRIME_Z))
        .wrapping_add(seed.wrapping_mul(PRIME_SEED));
    let n = (n ^ (n >> 13)).wrapping_mul(MIX);
    let n = n ^ (n >> 16);
    ((n as u32) as f32) / (u32::MAX as f32)
}

#[inline(always)]
fn smoothstep(t: f32) -> f32 {
    t * t * (3.0 - 2.0 * t)
}

#[inline(always)]
fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + t * (b - a)
}

/// 3D Value Noise, 0.0..1.0
#[inline]
pub fn noise3d(x: f32, y: f32, z: f32, seed: i32) -> f32 {
    let (fx, fy, fz) = (x.floor(), y.floor(), z.floor());
    let (xi, yi, zi) = (fx as i32, fy as i32, fz as i32);

    let xf = smoothstep(x - fx);
    let yf = smoothstep(y - fy);
    let zf = smoothstep(z - fz);

    let n000 = hash3d(xi, yi, zi, seed);
    let n100 = hash3d(xi + 1, yi, zi, seed);
    let n010 = hash3d(xi, yi + 1, zi, seed);
    let n110 = hash3d(xi + 1, yi + 1, zi, seed);
    let n001 = hash3d(xi, yi, zi + 1, seed);
    let n101 = hash3d(xi + 1, yi, zi + 1, seed);
    let n011 = hash3d(xi, yi + 1, zi + 1, seed);
    let n111 = hash3d(xi + 1, yi + 1, zi + 1, seed);

    let nx00 = lerp(n000, n100, xf);
    let nx10 = lerp(n010, n110, xf);
    let nx01 = lerp(n001, n101, xf);
    let nx11 = lerp(n011, n111, xf);

    let nxy0 = lerp(nx00, nx10, yf);
    let nxy1 = lerp(nx01, nx11, yf);

    lerp(nxy0, nxy1, zf)
}

/// 2D Value Noise, 0.0..1.0 (срез 3D решётки при z = 0)
#[inline]
pub fn noise2d(x: f32, z: f32, seed: i32) -> f32 {
    let (fx, fz) = (x.floor(), z.floor());
    let (xi, zi) = (fx as i32, fz as i32);
    let xf = smoothstep(x - fx);
    let zf = smoothstep(z - fz);

    let n00 = hash3d(xi, 0, zi, seed);
    let n10 = hash3d(xi + 1, 0, zi, seed);
    let n01 = hash3d(xi, 0, zi + 1, seed);
    let n11 = hash3d(xi + 1, 0, zi + 1, seed);

    lerp(lerp(n00, n10, xf), lerp(n01, n11, xf), zf)
}

/// Знаковый 2D шум, -1.0..1.0
#[inline]
pub fn snoise2d(x: f32, z: f32, seed: i32) -> f32 {
    noise2d(x, z, seed) * 2.0 - 1.0
}

/// Знаковый 3D шум, -1.0..1.0
#[inline]
pub fn snoise3d(x: f32, y: f32, z: f32, seed: i32) -> f32 {
    noise3d(x, y, z, seed) * 2.0 - 1.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_noise_is_deterministic() {
        let a = noise3d(12.3, -4.5, 99.1, 310);
        let b = noise3d(12.3, -4.5, 99.1, 310);
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn test_noise_range() {
        for i in 0..500 {
            let t = i as f32 * 0.37 - 80.0;
            let n3 = noise3d(t, t * 0.5, -t, 42);
            let n2 = noise2d(t, -t * 1.3, 42);
            assert!((0.0..=1.0).contains(&n3), "noise3d out of range: {}", n3);
            assert!((0.0..=1.0).contains(&n2), "noise2d out of range: {}", n2);
            assert!((-1.0..=1.0).contains(&snoise3d(t, 0.0, t, 1)));
        }
    }

    #[test]
    fn test_seed_changes_field() {
        let differs = (0..32).any(|i| {
            let x = i as f32 * 1.7 + 0.3;
            noise2d(x, x * 0.9, 1) != noise2d(x, x * 0.9, 2)
        });
        assert!(differs);
    }

    #[test]
    fn test_noise_matches_lattice_hash() {
        // В узлах решётки интерполяция не сдвигает значение
        assert_eq!(noise3d(3.0, 4.0, 5.0, 9), hash3d(3, 4, 5, 9));
        assert_eq!(noise2d(-2.0, 7.0, 9), hash3d(-2, 0, 7, 9));
    }
}
