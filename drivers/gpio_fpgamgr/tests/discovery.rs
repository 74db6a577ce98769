#![cfg(feature = "of")]

mod common;

use common::{FPGAMGR_GPIO_PATH, reference_tree, socfpga_tree};
use dev::{Device, OfNode};
use gpio_fpgamgr::{FpgamgrError, PlatformData};

fn fpgamgr_device(tree: dev::Handle<dt::DeviceTree>) -> Device {
    let node = OfNode::from_path(tree, FPGAMGR_GPIO_PATH).unwrap();
    Device::new("ff706010.gpio").with_of_node(node)
}

#[test]
fn reads_ports_in_tree_order() {
    let dev = fpgamgr_device(reference_tree());
    let pdata = PlatformData::from_of(&dev).unwrap();
    assert_eq!(pdata.nports(), 2);
    let ports: Vec<(&str, u32)> = pdata
        .properties
        .iter()
        .map(|pp| (pp.name.as_ref(), pp.idx))
        .collect();
    assert_eq!(
        ports,
        [
            ("/soc/gpio@ff706010/gpio@0", 0),
            ("/soc/gpio@ff706010/gpio@1", 1)
        ]
    );
    let node = pdata.properties[1].node.as_ref().unwrap();
    assert_eq!(node.full_path().as_ref(), "/soc/gpio@ff706010/gpio@1");
}

#[test]
fn single_port_is_enough() {
    let dev = fpgamgr_device(socfpga_tree(&[("gpio@1", Some(1))]));
    let pdata = PlatformData::from_of(&dev).unwrap();
    assert_eq!(pdata.nports(), 1);
    assert_eq!(pdata.properties[0].idx, 1);
}

#[test]
fn index_out_of_range_is_rejected() {
    let dev = fpgamgr_device(socfpga_tree(&[("gpio@0", Some(0)), ("gpio@2", Some(2))]));
    assert_eq!(
        PlatformData::from_of(&dev).unwrap_err(),
        FpgamgrError::InvalidPortIndex { name: "/soc/gpio@ff706010/gpio@2".into() }
    );
}

#[test]
fn missing_index_is_rejected() {
    let dev = fpgamgr_device(socfpga_tree(&[("gpio", None)]));
    assert_eq!(
        PlatformData::from_of(&dev).unwrap_err(),
        FpgamgrError::InvalidPortIndex { name: "/soc/gpio@ff706010/gpio".into() }
    );
}

#[test]
fn empty_node_is_rejected() {
    let dev = fpgamgr_device(socfpga_tree(&[]));
    assert_eq!(
        PlatformData::from_of(&dev).unwrap_err(),
        FpgamgrError::ConfigurationEmpty
    );
}

#[test]
fn device_without_node_has_no_configuration() {
    let dev = Device::new("fpgamgr").with_compatible("altr,fpgamgr-gpio");
    assert_eq!(
        PlatformData::from_of(&dev).unwrap_err(),
        FpgamgrError::ConfigurationAbsent
    );
}
