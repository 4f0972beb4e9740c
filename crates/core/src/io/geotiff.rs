//! GeoTIFF reading and writing with the `tiff` crate
//!
//! North-up rasters are georeferenced with ModelPixelScale + ModelTiepoint,
//! anything else with a ModelTransformation matrix. The no-data value
//! travels in the GDAL_NODATA ASCII tag so rasters stay readable by
//! GDAL-based tools such as `gdalwarp`.

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::io::{BufReader, BufWriter, Cursor, Read, Seek, Write};
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::colortype::Gray32Float;
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

/// Read band 1 of a GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(BufReader::new(file))
}

/// Read a GeoTIFF held in memory
pub fn read_geotiff_from_buffer<T: RasterElement>(data: &[u8]) -> Result<Raster<T>> {
    decode_geotiff(Cursor::new(data))
}

fn cast_all<S, T>(buf: Vec<S>) -> Vec<T>
where
    S: num_traits::NumCast + Copy,
    T: RasterElement,
{
    buf.into_iter()
        .map(|v| num_traits::cast(v).unwrap_or_else(T::default_nodata))
        .collect()
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: Read + Seek,
{
    let mut decoder = Decoder::new(reader)?.with_limits(Limits::unlimited());
    let (width, height) = decoder.dimensions()?;
    let (rows, cols) = (height as usize, width as usize);

    let mut stored_as_f32 = false;
    let data: Vec<T> = match decoder.read_image()? {
        DecodingResult::F32(buf) => {
            stored_as_f32 = true;
            cast_all(buf)
        }
        DecodingResult::F64(buf) => cast_all(buf),
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        DecodingResult::U32(buf) => cast_all(buf),
        DecodingResult::I8(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "unsupported TIFF sample format".to_string(),
            ))
        }
    };

    // Multi-band images decode interleaved; only band 1 is kept
    let bands = data.len() / (rows * cols).max(1);
    let data = if bands > 1 {
        data.into_iter().step_by(bands).collect()
    } else {
        data
    };

    let mut raster = Raster::from_vec(data, rows, cols)?;

    let transform = read_geotransform(&mut decoder).ok_or(Error::NotGeoreferenced)?;
    raster.set_transform(transform);

    if let Some(nodata) = read_nodata(&mut decoder) {
        // GDAL prints float32 sentinels with more precision than the samples
        // carry; round through f32 so equality tests match the stored cells
        let nodata = if stored_as_f32 { nodata as f32 as f64 } else { nodata };
        raster.set_nodata(num_traits::cast(nodata));
    }

    Ok(raster)
}

fn read_geotransform<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<GeoTransform> {
    let scale = decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).ok();
    let tiepoint = decoder.get_tag_f64_vec(Tag::ModelTiepointTag).ok();

    if let (Some(scale), Some(tiepoint)) = (scale, tiepoint) {
        if scale.len() >= 2 && tiepoint.len() >= 6 {
            // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
            let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
            let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
            return Some(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
        }
    }

    // Row-major 4x4: x = m0*col + m1*row + m3, y = m4*col + m5*row + m7
    let m = decoder.get_tag_f64_vec(Tag::ModelTransformationTag).ok()?;
    if m.len() < 16 {
        return None;
    }
    Some(GeoTransform::from_coefficients([m[3], m[0], m[1], m[7], m[4], m[5]]))
}

fn read_nodata<R: Read + Seek>(decoder: &mut Decoder<R>) -> Option<f64> {
    let text = decoder.get_tag_ascii_string(Tag::GdalNodata).ok()?;
    parse_nodata(&text)
}

fn parse_nodata(text: &str) -> Option<f64> {
    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    match text.to_ascii_lowercase().as_str() {
        "nan" => Some(f64::NAN),
        other => other.parse().ok(),
    }
}

/// Write a Raster as a single-band 32-bit float GeoTIFF, replacing any
/// existing file
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    let mut writer = BufWriter::new(file);
    encode_geotiff(raster, &mut writer)?;
    writer.flush()?;
    Ok(())
}

/// Encode a Raster into an in-memory GeoTIFF
pub fn write_geotiff_to_buffer<T: RasterElement>(raster: &Raster<T>) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_geotiff(raster, Cursor::new(&mut buf))?;
    Ok(buf)
}

fn encode_geotiff<T, W>(raster: &Raster<T>, writer: W) -> Result<()>
where
    T: RasterElement,
    W: Write + Seek,
{
    let gt = *raster.transform();
    let det = gt.pixel_width * gt.pixel_height - gt.row_rotation * gt.col_rotation;
    if !gt.coefficients().iter().all(|c| c.is_finite()) || det.abs() < 1e-12 {
        return Err(Error::InvalidParameter {
            name: "transform",
            value: format!("{:?}", gt.coefficients()),
            reason: "geotransform must be finite and invertible".into(),
        });
    }

    let mut encoder = TiffEncoder::new(writer)?;
    let (rows, cols) = raster.shape();

    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
        .collect();

    let mut image = encoder.new_image::<Gray32Float>(cols as u32, rows as u32)?;

    if gt.is_north_up() {
        let scale = [gt.pixel_width, -gt.pixel_height, 0.0];
        image.encoder().write_tag(Tag::ModelPixelScaleTag, &scale[..])?;

        let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
        image.encoder().write_tag(Tag::ModelTiepointTag, &tiepoint[..])?;
    } else {
        let matrix = [
            gt.pixel_width, gt.row_rotation, 0.0, gt.origin_x,
            gt.col_rotation, gt.pixel_height, 0.0, gt.origin_y,
            0.0, 0.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        ];
        image.encoder().write_tag(Tag::ModelTransformationTag, &matrix[..])?;
    }

    // Minimal key directory: projected model, pixel-is-area
    let geokeys: [u16; 12] = [1, 1, 0, 2, 1024, 0, 1, 1, 1025, 0, 1, 1];
    image.encoder().write_tag(Tag::GeoKeyDirectoryTag, &geokeys[..])?;

    if let Some(nodata) = raster.nodata().and_then(|v| v.to_f64()) {
        let text = if nodata.is_nan() {
            "nan".to_string()
        } else {
            nodata.to_string()
        };
        image.encoder().write_tag(Tag::GdalNodata, text.as_str())?;
    }

    image.write_data(&data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::NamedTempFile;

    #[test]
    fn test_write_read_roundtrip() {
        let mut raster: Raster<f64> = Raster::new(20, 30);
        raster.set_transform(GeoTransform::new(500_000.0, 4_000_000.0, 30.0, -30.0));
        raster.set_nodata(Some(-9999.0));
        for row in 0..20 {
            for col in 0..30 {
                raster.set(row, col, (row * 30 + col) as f64).unwrap();
            }
        }
        raster.set(3, 4, -9999.0).unwrap();

        let tmp = NamedTempFile::with_suffix(".tif").unwrap();
        write_geotiff(&raster, tmp.path()).unwrap();
        let loaded: Raster<f64> = read_geotiff(tmp.path()).unwrap();

        assert_eq!(loaded.shape(), (20, 30));
        assert_eq!(loaded.nodata(), Some(-9999.0));
        assert!(loaded.is_nodata(loaded.get(3, 4).unwrap()));
        assert_eq!(loaded.get(10, 10).unwrap(), 310.0);

        let gt = loaded.transform();
        assert_relative_eq!(gt.origin_x, 500_000.0);
        assert_relative_eq!(gt.origin_y, 4_000_000.0);
        assert_relative_eq!(gt.pixel_width, 30.0);
        assert_relative_eq!(gt.pixel_height, -30.0);
    }

    #[test]
    fn test_georeferencing_uses_standard_geotiff_tags() {
        let mut raster: Raster<f32> = Raster::filled(2, 3, 1.0);
        raster.set_transform(GeoTransform::new(400_000.0, 6_000_060.0, 30.0, -30.0));
        raster.set_nodata(Some(-9999.0));
        let buf = write_geotiff_to_buffer(&raster).unwrap();

        let mut decoder = Decoder::new(Cursor::new(&buf)).unwrap();
        assert_eq!(
            decoder.get_tag_f64_vec(Tag::ModelPixelScaleTag).unwrap(),
            vec![30.0, 30.0, 0.0]
        );
        assert_eq!(
            decoder.get_tag_f64_vec(Tag::ModelTiepointTag).unwrap(),
            vec![0.0, 0.0, 0.0, 400_000.0, 6_000_060.0, 0.0]
        );
        assert!(decoder.get_tag_u16_vec(Tag::GeoKeyDirectoryTag).is_ok());
        assert_eq!(decoder.get_tag_ascii_string(Tag::GdalNodata).unwrap(), "-9999");
    }

    #[test]
    fn test_missing_nodata_stays_undeclared() {
        let raster: Raster<u8> = Raster::filled(4, 4, 1);
        let buf = write_geotiff_to_buffer(&raster).unwrap();
        let loaded: Raster<f64> = read_geotiff_from_buffer(&buf).unwrap();
        assert_eq!(loaded.nodata(), None);
        assert_eq!(loaded.valid_sum(), 16.0);
    }

    #[test]
    fn test_overwrite_replaces_previous_contents() {
        let tmp = NamedTempFile::with_suffix(".tif").unwrap();
        write_geotiff(&Raster::<f32>::filled(50, 50, 2.0), tmp.path()).unwrap();
        write_geotiff(&Raster::<f32>::filled(5, 5, 1.0), tmp.path()).unwrap();

        let loaded: Raster<f32> = read_geotiff(tmp.path()).unwrap();
        assert_eq!(loaded.shape(), (5, 5));
        assert_eq!(loaded.statistics().sum, 25.0);
    }

    #[test]
    fn test_plain_tiff_without_georeferencing_is_rejected() {
        let mut buf = Vec::new();
        {
            let mut encoder = TiffEncoder::new(Cursor::new(&mut buf)).unwrap();
            encoder
                .write_image::<Gray32Float>(3, 2, &[1.0f32; 6])
                .unwrap();
        }
        let err = read_geotiff_from_buffer::<f64>(&buf).unwrap_err();
        assert!(matches!(err, Error::NotGeoreferenced));
    }

    #[test]
    fn test_rotated_transform_roundtrip() {
        let gt = GeoTransform::from_coefficients([1000.0, 28.0, 4.0, 5000.0, 3.0, -29.0]);
        let mut raster: Raster<f32> = Raster::filled(3, 4, 1.0);
        raster.set_transform(gt);

        let loaded: Raster<f32> =
            read_geotiff_from_buffer(&write_geotiff_to_buffer(&raster).unwrap()).unwrap();
        assert_eq!(loaded.transform().coefficients(), gt.coefficients());
    }

    #[test]
    fn test_south_up_transform_roundtrip() {
        let mut raster: Raster<f32> = Raster::filled(2, 2, 1.0);
        raster.set_transform(GeoTransform::new(100.0, 200.0, 10.0, 10.0));

        let loaded: Raster<f32> =
            read_geotiff_from_buffer(&write_geotiff_to_buffer(&raster).unwrap()).unwrap();
        assert_eq!(loaded.transform().pixel_height, 10.0);
        assert_eq!(loaded.pixel_to_geo(0, 1), (105.0, 215.0));
    }

    #[test]
    fn test_degenerate_transform_is_not_written() {
        let mut raster: Raster<f32> = Raster::filled(2, 2, 1.0);
        raster.set_transform(GeoTransform::new(0.0, 0.0, 0.0, -10.0));
        assert!(matches!(
            write_geotiff_to_buffer(&raster),
            Err(Error::InvalidParameter { name: "transform", .. })
        ));
    }

    #[test]
    fn test_parse_nodata_variants() {
        assert_eq!(parse_nodata("-9999\0"), Some(-9999.0));
        assert_eq!(parse_nodata(" 0 "), Some(0.0));
        assert!(parse_nodata("nan").unwrap().is_nan());
        assert_eq!(parse_nodata("none"), None);
    }
}
