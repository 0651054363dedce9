/*
 * Copyright (c) Meta Platforms, Inc. and affiliates.
 *
 * This source code is licensed under both the MIT license found in the
 * LICENSE-MIT file in the root directory of this source tree and the Apache
 * License, Version 2.0 found in the LICENSE-APACHE file in the root directory
 * of this source tree.
 */

//! Constructors for tests that build attribute schemas by hand.

use crate::attrs::attr::AttrType;
use crate::attrs::attr::Attribute;
use crate::attrs::coerced_attr::CoercedAttr;

pub trait AttributeExt {
    fn testing_new(attr_type: AttrType) -> Attribute;
    fn testing_new_with_default(attr_type: AttrType, default: CoercedAttr) -> Attribute;
}

impl AttributeExt for Attribute {
    fn testing_new(attr_type: AttrType) -> Attribute {
        Attribute::new(attr_type, None)
    }

    fn testing_new_with_default(attr_type: AttrType, default: CoercedAttr) -> Attribute {
        Attribute::new(attr_type, Some(default))
    }
}
