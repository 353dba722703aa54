#![allow(dead_code)]

use std::fs;
use std::path::Path;

use image::{GrayImage, Luma, Rgb, RgbImage};

fn ensure_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
}

/// Writes a solid RGB PNG.
pub fn write_png(path: &Path, width: u32, height: u32, color: [u8; 3]) {
    ensure_parent(path);
    RgbImage::from_pixel(width, height, Rgb(color))
        .save(path)
        .expect("write png file");
}

/// Writes a solid 8-bit grayscale PNG.
pub fn write_gray_png(path: &Path, width: u32, height: u32, value: u8) {
    ensure_parent(path);
    GrayImage::from_pixel(width, height, Luma([value]))
        .save(path)
        .expect("write gray png file");
}

pub fn write_text(path: &Path, contents: &str) {
    ensure_parent(path);
    fs::write(path, contents).expect("write text file");
}

/// COCO tree with `annotations/instances_{train,val}.json` and images under
/// `images/<split>/`.
///
/// train: `1` (100x200, one person box), `2` (50x50, no boxes)
/// val:   `10` (100x100, a car and an unknown-category box)
pub fn create_coco_dataset(root: &Path) {
    write_png(&root.join("images/train/a.png"), 100, 200, [255, 255, 255]);
    write_png(&root.join("images/train/b.png"), 50, 50, [0, 0, 0]);
    write_gray_png(&root.join("images/val/c.png"), 100, 100, 60);

    write_text(
        &root.join("annotations/instances_train.json"),
        r#"{
  "images": [
    {"id": 1, "file_name": "a.png", "width": 100, "height": 200},
    {"id": 2, "file_name": "b.png", "width": 50, "height": 50}
  ],
  "annotations": [
    {"id": 1, "image_id": 1, "category_id": 1, "bbox": [10, 20, 30, 40]}
  ],
  "categories": [{"id": 1, "name": "person"}, {"id": 2, "name": "car"}]
}"#,
    );
    write_text(
        &root.join("annotations/instances_val.json"),
        r#"{
  "images": [{"id": 10, "file_name": "c.png", "width": 100, "height": 100}],
  "annotations": [
    {"id": 5, "image_id": 10, "category_id": 2, "bbox": [0, 0, 50, 50], "score": 0.75},
    {"id": 6, "image_id": 10, "category_id": 99, "bbox": [40, 40, 20, 20]}
  ],
  "categories": [{"id": 2, "name": "car"}]
}"#,
    );
}

/// YOLO tree with `images/{train,val}/`, `labels/{train,val}/` and a
/// `data.yaml` class list (`cat`, `dog`).
pub fn create_yolo_dataset(root: &Path) {
    write_png(&root.join("images/train/t1.png"), 64, 32, [10, 20, 30]);
    write_png(&root.join("images/train/t2.jpg"), 32, 32, [200, 200, 200]);
    write_png(&root.join("images/val/v1.png"), 40, 40, [0, 0, 0]);

    write_text(
        &root.join("data.yaml"),
        "train: images/train\nval: images/val\nnames: ['cat', 'dog']\n",
    );
    write_text(
        &root.join("labels/train/t1.txt"),
        "0 0.5 0.5 0.2 0.2\n1 0.25 0.25 0.5 0.5 0.9\n",
    );
    write_text(&root.join("labels/train/t2.txt"), "bogus line here x y\n0 0.1 0.1\n");
    write_text(&root.join("labels/val/v1.txt"), "5 0.5 0.5 1.0 1.0\n");
}

pub const VOC_XML_IMG1: &str = r#"<annotation>
  <filename>img1.jpg</filename>
  <size><width>100</width><height>100</height><depth>3</depth></size>
  <object>
    <name>person</name>
    <bndbox><xmin>10</xmin><ymin>10</ymin><xmax>50</xmax><ymax>60</ymax></bndbox>
  </object>
  <object>
    <name>dog</name>
    <bndbox><xmin>0</xmin><ymin>80</ymin><xmax>20</xmax><ymax>100</ymax></bndbox>
  </object>
</annotation>"#;

/// VOC tree with `Annotations/`, `JPEGImages/` and `ImageSets/Main/` lists.
pub fn create_voc_dataset(root: &Path) {
    write_text(&root.join("Annotations/img1.xml"), VOC_XML_IMG1);
    write_text(
        &root.join("Annotations/img2.xml"),
        r#"<annotation>
  <filename>img2.png</filename>
  <size><width>200</width><height>100</height></size>
  <object><name>cat</name></object>
</annotation>"#,
    );
    write_text(
        &root.join("Annotations/broken.xml"),
        "<annotation><size><width>10",
    );
    write_text(
        &root.join("Annotations/nosize.xml"),
        "<annotation><filename>x.jpg</filename></annotation>",
    );

    write_png(&root.join("JPEGImages/img1.jpg"), 100, 100, [128, 128, 128]);
    write_text(&root.join("ImageSets/Main/train.txt"), "img1\n");
    write_text(&root.join("ImageSets/Main/val.txt"), "img2\n");
}
